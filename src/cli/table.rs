//! Table formatting utilities for CLI list commands
//!
//! Every list command builds `TableRow`s against a static column set and
//! hands them to a `TableFormatter`, which renders them in the requested
//! output format.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::io;

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;

/// Configuration for table output
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Show summary line after table (e.g., "5 article(s) found")
    pub show_summary: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { show_summary: true }
    }
}

impl TableConfig {
    /// Create config optimized for piping (no summary)
    pub fn for_pipe() -> Self {
        Self {
            show_summary: false,
        }
    }
}

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Database id (cyan)
    Id(i64),
    /// Article or part number (cyan)
    Key(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Quantity or count, never truncated
    Number(String),
    /// Document link reason, green when linked
    Reason(String),
    /// Run status or issue severity
    Status(String),
}

impl CellValue {
    /// Format for TSV output (with styling and padding)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Key(key) => format!(
                "{:<width$}",
                style(truncate_str(key, width)).cyan(),
                width = width
            ),
            CellValue::Text(text) => {
                format!("{:<width$}", truncate_str(text, width.saturating_sub(2)), width = width)
            }
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Reason(reason) => {
                let styled = if reason.starts_with("matched") {
                    style(reason.as_str()).green()
                } else {
                    style(reason.as_str()).yellow()
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Status(status) => {
                let styled = match status.as_str() {
                    "completed" => style(status.as_str()).green(),
                    "failed" | "error" => style(status.as_str()).red(),
                    _ => style(status.as_str()).yellow(),
                };
                format!("{:<width$}", styled, width = width)
            }
        }
    }

    /// Format for Markdown output (pipes escaped)
    pub fn format_md(&self) -> String {
        self.raw().replace('|', "\\|")
    }

    /// Raw value without styling
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(id) => id.to_string(),
            CellValue::Key(s)
            | CellValue::Text(s)
            | CellValue::Number(s)
            | CellValue::Reason(s)
            | CellValue::Status(s) => s.clone(),
        }
    }

    /// JSON value; ids stay numeric
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Id(id) => serde_json::Value::from(*id),
            CellValue::Number(n) => n
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.clone())),
            other => serde_json::Value::String(other.raw()),
        }
    }

    /// Get the display width of the raw content
    pub fn display_width(&self) -> usize {
        self.raw().chars().count()
    }
}

/// Column definition for table output
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Key used in CSV/JSON output
    pub key: &'static str,
    /// Header shown in TSV/Markdown output
    pub header: &'static str,
    /// Maximum width in TSV output
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of table data
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell value (builder pattern)
    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Renders rows for one column set
pub struct TableFormatter {
    columns: &'static [ColumnDef],
    entity_name: &'static str,
    config: TableConfig,
}

impl TableFormatter {
    pub fn new(columns: &'static [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            config: TableConfig::default(),
        }
    }

    /// Configure the formatter with custom settings
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Output rows in the specified format
    pub fn output<I>(&self, rows: I, format: OutputFormat) -> Result<()>
    where
        I: IntoIterator<Item = TableRow>,
    {
        let rows: Vec<TableRow> = rows.into_iter().collect();

        match format {
            OutputFormat::Csv => self.output_csv(&rows),
            OutputFormat::Md => {
                self.output_md(&rows);
                Ok(())
            }
            OutputFormat::Json => self.output_json(&rows),
            OutputFormat::Tsv | OutputFormat::Auto => {
                self.output_tsv(&rows);
                Ok(())
            }
        }
    }

    /// Dynamic column widths: the widest of header and content, capped at
    /// the column's width
    fn calculate_widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                col.header
                    .len()
                    .max(max_content.saturating_add(2))
                    .min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow]) {
        let widths = self.calculate_widths(rows);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let parts: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => format!("{:<width$}", "-", width = *w),
                })
                .collect();
            println!("{}", parts.join(" ").trim_end());
        }

        if self.config.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_csv(&self, rows: &[TableRow]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(io::stdout());
        writer
            .write_record(self.columns.iter().map(|c| c.key))
            .into_diagnostic()?;
        for row in rows {
            writer
                .write_record(
                    self.columns
                        .iter()
                        .map(|c| row.get(c.key).map(|v| v.raw()).unwrap_or_default()),
                )
                .into_diagnostic()?;
        }
        writer.flush().into_diagnostic()
    }

    fn output_md(&self, rows: &[TableRow]) {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.header).collect();
        println!("| {} |", headers.join(" | "));
        let separators: Vec<&str> = headers.iter().map(|_| "---").collect();
        println!("|{}|", separators.join("|"));

        for row in rows {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    row.get(c.key)
                        .map(|v| v.format_md())
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();
            println!("| {} |", values.join(" | "));
        }
    }

    fn output_json(&self, rows: &[TableRow]) -> Result<()> {
        let values: Vec<serde_json::Value> = rows.iter().map(|row| self.row_json(row)).collect();
        let text = serde_json::to_string_pretty(&values).into_diagnostic()?;
        println!("{}", text);
        Ok(())
    }

    fn row_json(&self, row: &TableRow) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .map(|c| {
                let value = row
                    .get(c.key)
                    .map(|v| v.to_json())
                    .unwrap_or(serde_json::Value::Null);
                (c.key.to_string(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("id", "ID", 8),
        ColumnDef::new("title", "TITLE", 12),
        ColumnDef::new("qty", "QTY", 6),
    ];

    #[test]
    fn test_cell_value_raw_and_md() {
        assert_eq!(CellValue::Id(7).raw(), "7");
        assert_eq!(CellValue::Text("a|b".into()).format_md(), "a\\|b");
        assert_eq!(CellValue::Reason("matched_part_fallback".into()).display_width(), 21);
    }

    #[test]
    fn test_cell_value_json_keeps_numbers() {
        assert_eq!(CellValue::Id(3).to_json(), serde_json::json!(3));
        assert_eq!(CellValue::Number("2.5".into()).to_json(), serde_json::json!(2.5));
        assert_eq!(CellValue::Number("".into()).to_json(), serde_json::json!(""));
        assert_eq!(CellValue::Key("P-1".into()).to_json(), serde_json::json!("P-1"));
    }

    #[test]
    fn test_widths_fit_content_up_to_cap() {
        let formatter = TableFormatter::new(COLUMNS, "row");
        let rows = vec![TableRow::new()
            .cell("id", CellValue::Id(12))
            .cell("title", CellValue::Text("a rather long title".into()))];
        assert_eq!(formatter.calculate_widths(&rows), vec![4, 12, 3]);
    }

    #[test]
    fn test_row_json_fills_missing_cells_with_null() {
        let formatter = TableFormatter::new(COLUMNS, "row");
        let row = TableRow::new().cell("id", CellValue::Id(1));
        let json = formatter.row_json(&row);
        assert_eq!(json["id"], serde_json::json!(1));
        assert!(json["qty"].is_null());
    }

    #[test]
    fn test_tsv_text_is_truncated() {
        let cell = CellValue::Text("hexagon socket head cap screw".into());
        let formatted = cell.format_tsv(12);
        assert!(formatted.starts_with("hexagon..."));
    }
}
