//! BOM sheet parsing
//!
//! Reads workbooks (xlsx/xlsm/xls via calamine, csv via the csv crate) into
//! raw cell grids, locates the header row of each sheet and turns the rows
//! below it into [`ParsedLine`] records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::core::mapping::{map_headers, parse_qty, CanonicalField};

/// Default number of leading rows searched for a header row
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 30;

/// File extensions recognized as BOM sources (lowercase, without dot)
pub const BOM_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "csv"];

static ARTICLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bBOM\s*(\d{3,})\b").expect("valid regex"));
static FALLBACK_ARTICLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{3,})\b").expect("valid regex"));
static LEADING_BOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^bom\s*").expect("valid regex"));
static DOT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").expect("valid regex"));

/// Errors raised while reading a BOM file
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("unsupported BOM file extension: {0:?}")]
    #[diagnostic(code(bomdex::parse::extension))]
    UnsupportedExtension(PathBuf),

    #[error("failed to open workbook {path:?}: {message}")]
    #[diagnostic(code(bomdex::parse::workbook))]
    Workbook { path: PathBuf, message: String },

    #[error("failed to read sheet '{sheet}' of {path:?}: {message}")]
    #[diagnostic(code(bomdex::parse::sheet))]
    Sheet {
        path: PathBuf,
        sheet: String,
        message: String,
    },
}

/// A resolved spreadsheet cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Blank cells and whitespace-only text count as empty
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for headers and free-text fields
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => format_float(*f),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// JSON form used for the raw extra-column bag
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Empty => serde_json::Value::Null,
            CellValue::Int(i) => serde_json::Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&calamine::Data> for CellValue {
    fn from(cell: &calamine::Data) -> Self {
        use calamine::Data;
        match cell {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// One worksheet of raw cell values, row 0 being spreadsheet row 1
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// A parsed BOM row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedLine {
    pub part_number: String,
    pub description: Option<String>,
    pub qty: Option<f64>,
    pub revision: Option<String>,
    pub material: Option<String>,
    pub finish: Option<String>,
    pub line_type: Option<String>,
    pub status: Option<String>,
    pub unit: Option<String>,
    pub item_no: Option<String>,
    pub line_no: Option<i64>,
    /// Non-empty cells of unmapped columns, keyed by their header text
    pub raw_columns: BTreeMap<String, serde_json::Value>,
    pub source_sheet: String,
    /// 1-based spreadsheet row
    pub source_row_number: usize,
}

/// A parsed BOM file
#[derive(Debug, Clone)]
pub struct ParsedBom {
    pub article_number: String,
    pub article_title: String,
    pub lines: Vec<ParsedLine>,
    pub source_file: PathBuf,
}

/// The detected header row of a sheet
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMatch {
    /// 0-based index into the sheet rows
    pub row_index: usize,
    pub columns: BTreeMap<usize, CanonicalField>,
}

impl HeaderMatch {
    /// Column index per field. A later column wins over an earlier one
    /// mapped to the same field.
    pub fn field_columns(&self) -> BTreeMap<CanonicalField, usize> {
        let mut by_field = BTreeMap::new();
        for (idx, field) in &self.columns {
            by_field.insert(*field, *idx);
        }
        by_field
    }
}

/// Typed accessor over one data row
struct MappedRow<'a> {
    cells: &'a [CellValue],
    fields: &'a BTreeMap<CanonicalField, usize>,
}

impl<'a> MappedRow<'a> {
    fn get(&self, field: CanonicalField) -> Option<&'a CellValue> {
        let idx = *self.fields.get(&field)?;
        self.cells.get(idx).filter(|cell| !cell.is_blank())
    }

    fn text(&self, field: CanonicalField) -> Option<String> {
        self.get(field).map(|c| c.to_text().trim().to_string()).filter(|s| !s.is_empty())
    }

    fn qty(&self) -> Option<f64> {
        match self.get(CanonicalField::Qty)? {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            other => parse_qty(&other.to_text()),
        }
    }
}

/// Find the row among the first `max_scan` rows with the most recognized
/// columns that also has a part number column. Ties go to the first row.
pub fn detect_header(rows: &[Vec<CellValue>], max_scan: usize) -> Option<HeaderMatch> {
    let mut best: Option<HeaderMatch> = None;
    for (idx, row) in rows.iter().take(max_scan).enumerate() {
        let columns = map_headers(row.iter().map(|c| c.to_text()));
        if !columns.values().any(|f| *f == CanonicalField::PartNumber) {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |b| columns.len() > b.columns.len());
        if better {
            best = Some(HeaderMatch {
                row_index: idx,
                columns,
            });
        }
    }
    best
}

/// Parse the rows of one worksheet. A sheet without a usable header yields
/// no lines.
///
/// Rows blank in every mapped column are dropped. Rows with data but no part
/// number are kept with an empty `part_number` for the caller to report.
pub fn parse_sheet_rows(sheet_name: &str, rows: &[Vec<CellValue>], max_scan: usize) -> Vec<ParsedLine> {
    let Some(header) = detect_header(rows, max_scan) else {
        return Vec::new();
    };
    let fields = header.field_columns();
    let headers = &rows[header.row_index];

    let mut parsed = Vec::new();
    for (offset, row) in rows.iter().enumerate().skip(header.row_index + 1) {
        let mapped = MappedRow {
            cells: row,
            fields: &fields,
        };
        let part_number = mapped.text(CanonicalField::PartNumber).unwrap_or_default();
        if part_number.is_empty() && fields.keys().all(|field| mapped.get(*field).is_none()) {
            continue;
        }

        let mut raw_columns = BTreeMap::new();
        for (idx, value) in row.iter().enumerate() {
            if header.columns.contains_key(&idx) || value.is_blank() {
                continue;
            }
            let key = headers
                .get(idx)
                .map(|h| h.to_text().trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| format!("col_{}", idx + 1));
            raw_columns.insert(key, value.to_json());
        }

        let position = mapped.get(CanonicalField::LineNo);
        parsed.push(ParsedLine {
            part_number,
            description: mapped.text(CanonicalField::Description),
            qty: mapped.qty(),
            revision: mapped.text(CanonicalField::Revision),
            material: mapped.text(CanonicalField::Material),
            finish: mapped.text(CanonicalField::Finish),
            line_type: mapped.text(CanonicalField::LineType),
            status: mapped.text(CanonicalField::Status),
            unit: mapped.text(CanonicalField::Unit),
            item_no: position.and_then(to_item_no),
            line_no: position.and_then(to_line_no),
            raw_columns,
            source_sheet: sheet_name.to_string(),
            source_row_number: offset + 1,
        });
    }
    parsed
}

/// Derive (article number, title) from a BOM filename.
///
/// "BOM 17004 Leva single.xls" -> ("17004", "Leva single")
pub fn extract_article_from_filename(filename: &str) -> (String, String) {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    let article = ARTICLE_PATTERN
        .captures(&stem)
        .or_else(|| FALLBACK_ARTICLE_PATTERN.captures(&stem))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| format!("UNKNOWN_{}", stem));

    let without_bom = LEADING_BOM.replace(&stem, "");
    let without_bom = without_bom.trim();
    let title = without_bom
        .strip_prefix(article.as_str())
        .unwrap_or(without_bom)
        .trim();

    let title = if title.is_empty() { stem.clone() } else { title.to_string() };
    (article, title)
}

/// Normalize a position cell to dotted form ("4.0" -> "4", " 4..32. " -> "4.32")
pub fn to_item_no(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Empty => None,
        CellValue::Int(i) => Some(i.to_string()),
        CellValue::Float(f) => Some(format_float(*f)),
        other => {
            let text: String = other.to_text().chars().filter(|c| !c.is_whitespace()).collect();
            let collapsed = DOT_RUNS.replace_all(&text, ".");
            let trimmed = collapsed.trim_matches('.');
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}

/// Integer value of a position cell, when it is integral
pub fn to_line_no(value: &CellValue) -> Option<i64> {
    match value {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) => float_to_int(*f),
        CellValue::Empty | CellValue::Bool(_) => None,
        CellValue::Text(s) => {
            let text = s.trim();
            if text.is_empty() || (text.contains('.') && !text.ends_with(".0")) {
                return None;
            }
            text.parse::<f64>().ok().and_then(float_to_int)
        }
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| f as i64)
}

fn format_float(f: f64) -> String {
    match float_to_int(f) {
        Some(i) => i.to_string(),
        None => f.to_string().trim_end_matches('.').to_string(),
    }
}

/// Read every worksheet of a BOM file
pub fn read_sheets(path: &Path) -> Result<Vec<Sheet>, ParseError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" => read_workbook(path),
        "csv" => read_csv(path).map(|sheet| vec![sheet]),
        _ => Err(ParseError::UnsupportedExtension(path.to_path_buf())),
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Sheet>, ParseError> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| ParseError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ParseError::Sheet {
                path: path.to_path_buf(),
                sheet: name.clone(),
                message: e.to_string(),
            })?;

        // Ranges start at the first used cell; pad back to A1 so row numbers
        // match the spreadsheet.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![CellValue::Empty; col_offset];
            cells.extend(row.iter().map(CellValue::from));
            rows.push(cells);
        }
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

fn read_csv(path: &Path) -> Result<Sheet, ParseError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let sheet_err = |message: String| ParseError::Sheet {
        path: path.to_path_buf(),
        sheet: name.clone(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ParseError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| sheet_err(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(Sheet { name, rows })
}

/// Parse a BOM file: article identity from the filename, lines from every sheet
pub fn parse_bom_file(path: &Path, header_scan_rows: usize) -> Result<ParsedBom, ParseError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (article_number, article_title) = extract_article_from_filename(&filename);

    let mut lines = Vec::new();
    for sheet in read_sheets(path)? {
        lines.extend(parse_sheet_rows(&sheet.name, &sheet.rows, header_scan_rows));
    }

    Ok(ParsedBom {
        article_number,
        article_title,
        lines,
        source_file: path.to_path_buf(),
    })
}

/// Whether a path has a recognized BOM extension (lock files excluded)
pub fn is_bom_file(path: &Path) -> bool {
    let is_lock = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("~$"))
        .unwrap_or(false);
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !is_lock && BOM_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    /// Write `rows` into sheet `sheet` of a new xlsx file, the first row at
    /// 1-based (`col`, `row`). Numeric strings become number cells.
    pub(crate) fn write_workbook(path: &Path, sheet: &str, origin: (u32, u32), rows: &[&[&str]]) {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        let ws = book.new_sheet(sheet).unwrap();
        ws.get_cell_mut((1, 1)).set_value_string("Bill of materials");
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let cell = ws.get_cell_mut((origin.0 + c as u32, origin.1 + r as u32));
                match value.parse::<f64>() {
                    Ok(number) => cell.set_value_number(number),
                    Err(_) => cell.set_value_string(*value),
                };
            }
        }
        umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
    }

    fn header_row() -> Vec<CellValue> {
        [
            "Item No.",
            "Part Number",
            "Revision",
            "Description",
            "Material",
            "Finish",
            "Qty",
            "Type",
            "Status",
            "Supplier",
        ]
        .iter()
        .map(|h| text(h))
        .collect()
    }

    #[test]
    fn test_extract_article_from_filename() {
        let (article, title) = extract_article_from_filename("BOM 17004 Leva single.xls");
        assert_eq!(article, "17004");
        assert_eq!(title, "Leva single");

        let (article, _) = extract_article_from_filename("BOM 500 Demo Child.xlsx");
        assert_eq!(article, "500");

        let (article, title) = extract_article_from_filename("Frame 20331 welded.xlsx");
        assert_eq!(article, "20331");
        assert_eq!(title, "Frame 20331 welded");

        let (article, title) = extract_article_from_filename("frame.xlsx");
        assert_eq!(article, "UNKNOWN_frame");
        assert_eq!(title, "frame");
    }

    #[test]
    fn test_parse_sheet_rows_with_title_rows_above_header() {
        let rows = vec![
            vec![text("Bill of materials"), CellValue::Empty],
            vec![text("Customer: ACME")],
            header_row(),
            vec![
                CellValue::Int(10),
                text("SCREW-001"),
                text("A"),
                text("Screw M4"),
                text("Steel"),
                text("Zinc"),
                CellValue::Int(4),
                text("hardware"),
                text("Approved"),
                text("Fasteners BV"),
            ],
            vec![
                text("4.32.1"),
                text("KNOB-001"),
                text("B"),
                text("Adjust knob sub"),
                text("Plastic"),
                CellValue::Empty,
                CellValue::Int(1),
                text("mechanical"),
                text("Released"),
            ],
            vec![CellValue::Empty, text("   "), text("C")],
            vec![
                CellValue::Float(20.0),
                text("PLATE-123"),
                text("B"),
                text("Plate"),
                text("Aluminum"),
                text("Anodized"),
                text("1,5"),
                text("mechanical"),
                text("Denied"),
            ],
        ];

        let lines = parse_sheet_rows("BOM", &rows, DEFAULT_HEADER_SCAN_ROWS);
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0].part_number, "SCREW-001");
        assert_eq!(lines[0].item_no.as_deref(), Some("10"));
        assert_eq!(lines[0].line_no, Some(10));
        assert_eq!(lines[0].qty, Some(4.0));
        assert_eq!(lines[0].finish.as_deref(), Some("Zinc"));
        assert_eq!(lines[0].line_type.as_deref(), Some("hardware"));
        assert_eq!(lines[0].status.as_deref(), Some("Approved"));
        assert_eq!(lines[0].source_sheet, "BOM");
        assert_eq!(lines[0].source_row_number, 4);
        assert_eq!(
            lines[0].raw_columns.get("Supplier"),
            Some(&serde_json::Value::String("Fasteners BV".to_string()))
        );

        assert_eq!(lines[1].item_no.as_deref(), Some("4.32.1"));
        assert_eq!(lines[1].line_no, None);
        assert_eq!(lines[1].finish, None);
        assert!(lines[1].raw_columns.is_empty());

        // revision only, no part number
        assert_eq!(lines[2].part_number, "");
        assert_eq!(lines[2].revision.as_deref(), Some("C"));
        assert_eq!(lines[2].source_row_number, 6);

        assert_eq!(lines[3].item_no.as_deref(), Some("20"));
        assert_eq!(lines[3].qty, Some(1.5));
        assert_eq!(lines[3].source_row_number, 7);
    }

    #[test]
    fn test_fully_blank_rows_are_dropped() {
        let rows = vec![
            vec![text("Part No"), text("Qty"), text("Notes")],
            vec![text("P-1"), CellValue::Int(1)],
            vec![CellValue::Empty, text("  "), text("unmapped only")],
            vec![],
            vec![CellValue::Empty, CellValue::Int(4)],
        ];
        let lines = parse_sheet_rows("S", &rows, DEFAULT_HEADER_SCAN_ROWS);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].part_number, "P-1");
        assert_eq!(lines[1].part_number, "");
        assert_eq!(lines[1].qty, Some(4.0));
        assert_eq!(lines[1].source_row_number, 5);
    }

    #[test]
    fn test_detect_header_requires_part_number_and_prefers_richest_row() {
        let rows = vec![
            vec![text("Description"), text("Qty"), text("Material"), text("Finish")],
            vec![text("Part No"), text("Qty")],
            vec![text("Part No"), text("Qty"), text("Rev")],
            vec![text("Pn"), text("Aantal"), text("Versie")],
        ];
        let header = detect_header(&rows, DEFAULT_HEADER_SCAN_ROWS).unwrap();
        assert_eq!(header.row_index, 2);
        assert_eq!(header.columns.len(), 3);
    }

    #[test]
    fn test_sheet_without_header_yields_no_lines() {
        let rows = vec![
            vec![text("Notes"), text("Qty")],
            vec![text("something"), CellValue::Int(3)],
        ];
        assert!(parse_sheet_rows("Notes", &rows, DEFAULT_HEADER_SCAN_ROWS).is_empty());
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let mut rows = vec![vec![text("filler")]; 5];
        rows.push(vec![text("Part No"), text("Qty")]);
        rows.push(vec![text("P-1"), CellValue::Int(1)]);
        assert!(parse_sheet_rows("S", &rows, 5).is_empty());
        assert_eq!(parse_sheet_rows("S", &rows, 6).len(), 1);
    }

    #[test]
    fn test_item_number_normalization() {
        assert_eq!(to_item_no(&CellValue::Float(4.0)).as_deref(), Some("4"));
        assert_eq!(to_item_no(&CellValue::Float(4.32)).as_deref(), Some("4.32"));
        assert_eq!(to_item_no(&text("4.32")).as_deref(), Some("4.32"));
        assert_eq!(to_item_no(&text(" 4..32. ")).as_deref(), Some("4.32"));
        assert_eq!(to_item_no(&text("..")), None);
        assert_eq!(to_item_no(&CellValue::Empty), None);
    }

    #[test]
    fn test_line_number_only_for_integral_values() {
        assert_eq!(to_line_no(&CellValue::Float(20.0)), Some(20));
        assert_eq!(to_line_no(&CellValue::Float(4.5)), None);
        assert_eq!(to_line_no(&text("7.0")), Some(7));
        assert_eq!(to_line_no(&text("4.32")), None);
        assert_eq!(to_line_no(&text("abc")), None);
    }

    #[test]
    fn test_parse_csv_bom_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("BOM 17001 Test.csv");
        std::fs::write(
            &path,
            "Item No.,Part Number,Rev,Omschrijving,Aantal\n10,SCREW-001,A,Screw M4,4\n20,PLATE-123,,Plate,\"1,5\"\n",
        )
        .unwrap();

        let parsed = parse_bom_file(&path, DEFAULT_HEADER_SCAN_ROWS).unwrap();
        assert_eq!(parsed.article_number, "17001");
        assert_eq!(parsed.article_title, "Test");
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[0].source_sheet, "BOM 17001 Test");
        assert_eq!(parsed.lines[0].source_row_number, 2);
        assert_eq!(parsed.lines[1].revision, None);
        assert_eq!(parsed.lines[1].qty, Some(1.5));
    }

    #[test]
    fn test_parse_xlsx_bom_file_with_offset_header() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("BOM 17004 Leva single.xlsx");
        write_workbook(
            &path,
            "Stuklijst",
            (2, 3),
            &[
                &["Pos", "Onderdeelnummer", "Omschrijving", "Aantal", "Versie"],
                &["10", "SCREW-001", "Screw M4", "4", "A"],
                &["4.32", "KNOB-001", "Knob", "1.5", ""],
            ],
        );

        let parsed = parse_bom_file(&path, DEFAULT_HEADER_SCAN_ROWS).unwrap();
        assert_eq!(parsed.article_number, "17004");
        assert_eq!(parsed.article_title, "Leva single");
        assert_eq!(parsed.lines.len(), 2);

        let first = &parsed.lines[0];
        assert_eq!(first.item_no.as_deref(), Some("10"));
        assert_eq!(first.line_no, Some(10));
        assert_eq!(first.part_number, "SCREW-001");
        assert_eq!(first.qty, Some(4.0));
        assert_eq!(first.revision.as_deref(), Some("A"));
        assert_eq!(first.source_sheet, "Stuklijst");
        assert_eq!(first.source_row_number, 4);

        let second = &parsed.lines[1];
        assert_eq!(second.item_no.as_deref(), Some("4.32"));
        assert_eq!(second.line_no, None);
        assert_eq!(second.qty, Some(1.5));
        assert_eq!(second.revision, None);
        assert_eq!(second.source_row_number, 5);
    }

    #[test]
    fn test_unsupported_extension_is_an_error() {
        let err = read_sheets(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_is_bom_file() {
        assert!(is_bom_file(Path::new("BOM 100.XLSX")));
        assert!(is_bom_file(Path::new("bom.csv")));
        assert!(!is_bom_file(Path::new("~$BOM 100.xlsx")));
        assert!(!is_bom_file(Path::new("drawing.pdf")));
    }
}
