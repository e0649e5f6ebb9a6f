//! Writing line edits back into source BOM files
//!
//! Every indexed line remembers the sheet and row it came from. An edit is
//! written into that cell of the column the header row maps to the field,
//! after which the index is refreshed so the edit shows up everywhere.
//! CSV files are rewritten through the csv crate and xlsx/xlsm workbooks
//! through umya-spreadsheet. Legacy `.xls` workbooks are read-only.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use miette::{Diagnostic, IntoDiagnostic, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::core::config::IndexConfig;
use crate::core::indexer::{run_index, IndexStats};
use crate::core::mapping::{parse_qty, CanonicalField};
use crate::core::matching::suggest_revisions;
use crate::core::parser::{detect_header, read_sheets};
use crate::core::store::BomStore;

#[derive(Debug, Error, Diagnostic)]
pub enum WriteBackError {
    #[error("BOM line {0} not found")]
    #[diagnostic(code(bomdex::writeback::line))]
    LineNotFound(i64),

    #[error("BOM line {line_id} has no recorded source file, sheet or row")]
    #[diagnostic(
        code(bomdex::writeback::provenance),
        help("run `bomdex index` to refresh the line's source information")
    )]
    NoProvenance { line_id: i64 },

    #[error("source BOM {path} no longer exists")]
    #[diagnostic(code(bomdex::writeback::missing))]
    SourceMissing { path: PathBuf },

    #[error("cannot write to legacy .xls workbook {path}")]
    #[diagnostic(
        code(bomdex::writeback::xls),
        help("save the workbook as .xlsx and re-index")
    )]
    XlsUnsupported { path: PathBuf },

    #[error("sheet '{sheet}' of {path} has no header row with a part number column")]
    #[diagnostic(code(bomdex::writeback::header))]
    NoHeader { path: PathBuf, sheet: String },

    #[error("failed to write {path}: {message}")]
    #[diagnostic(code(bomdex::writeback::write))]
    Write { path: PathBuf, message: String },
}

/// New cell values for one indexed BOM line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineEdit {
    pub line_id: i64,
    pub values: BTreeMap<CanonicalField, String>,
}

impl LineEdit {
    pub fn new(line_id: i64) -> Self {
        Self {
            line_id,
            values: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: CanonicalField, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }
}

/// What a write-back changed and the index run that picked it up
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteBackSummary {
    pub files_written: usize,
    pub cells_written: usize,
    /// Fields whose column the source sheet does not have
    pub fields_skipped: usize,
    pub index: Option<IndexStats>,
}

/// One target cell, row 1-based, column 0-based
#[derive(Debug, Clone)]
struct CellWrite {
    sheet: String,
    row: usize,
    field: CanonicalField,
    value: String,
}

/// Write `edits` into their source files and re-index. Developer mode only.
pub fn apply_line_edits(store: &BomStore, edits: &[LineEdit], config: &IndexConfig) -> Result<WriteBackSummary> {
    config.require_developer_mode("BOM write-back")?;

    let mut by_file: BTreeMap<PathBuf, Vec<CellWrite>> = BTreeMap::new();
    for edit in edits.iter().filter(|e| !e.values.is_empty()) {
        let line = store
            .bom_line(edit.line_id)
            .ok_or(WriteBackError::LineNotFound(edit.line_id))?;
        let no_provenance = || WriteBackError::NoProvenance { line_id: line.id };

        let source = store
            .article(line.article_id)
            .and_then(|a| a.source_bom_path)
            .ok_or_else(no_provenance)?;
        let sheet = line.source_sheet.clone().ok_or_else(no_provenance)?;
        let row = line
            .source_row_number
            .filter(|r| *r > 0)
            .ok_or_else(no_provenance)? as usize;

        let writes = by_file.entry(PathBuf::from(source)).or_default();
        for (field, value) in &edit.values {
            writes.push(CellWrite {
                sheet: sheet.clone(),
                row,
                field: *field,
                value: value.trim().to_string(),
            });
        }
    }

    // Resolve every target cell before the first file is touched
    let mut summary = WriteBackSummary::default();
    let mut plans = Vec::new();
    for (path, writes) in &by_file {
        check_writable(path)?;
        let columns = header_columns(path, config.header_scan_rows)?;
        let mut targets = Vec::new();
        for write in writes {
            let fields = columns.get(&write.sheet).ok_or_else(|| WriteBackError::NoHeader {
                path: path.clone(),
                sheet: write.sheet.clone(),
            })?;
            match fields.get(&write.field) {
                Some(col) => targets.push((write, *col)),
                None => summary.fields_skipped += 1,
            }
        }
        if !targets.is_empty() {
            plans.push((path, targets));
        }
    }

    for (path, targets) in &plans {
        if is_csv(path) {
            write_csv(path, targets)?;
        } else {
            write_workbook(path, targets)?;
        }
        info!(file = %path.display(), cells = targets.len(), "BOM edits written");
        summary.files_written += 1;
        summary.cells_written += targets.len();
    }

    if summary.files_written > 0 {
        summary.index = Some(run_index(store, config)?);
    }
    Ok(summary)
}

/// Write every revision suggestion of an article into its source BOM
pub fn apply_revision_suggestions(
    store: &BomStore,
    article_id: i64,
    config: &IndexConfig,
) -> Result<WriteBackSummary> {
    let edits: Vec<LineEdit> = suggest_revisions(store, article_id, config)?
        .into_iter()
        .map(|s| LineEdit::new(s.line_id).set(CanonicalField::Revision, s.suggested_revision))
        .collect();
    apply_line_edits(store, &edits, config)
}

/// Only existing csv/xlsx/xlsm files can be written
fn check_writable(path: &Path) -> Result<(), WriteBackError> {
    if !path.is_file() {
        return Err(WriteBackError::SourceMissing {
            path: path.to_path_buf(),
        });
    }
    if extension(path) == "xls" {
        return Err(WriteBackError::XlsUnsupported {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_csv(path: &Path) -> bool {
    extension(path) == "csv"
}

/// Field columns per sheet, detected the same way the indexer does
fn header_columns(
    path: &Path,
    header_scan_rows: usize,
) -> Result<HashMap<String, BTreeMap<CanonicalField, usize>>> {
    let mut columns = HashMap::new();
    for sheet in read_sheets(path)? {
        if let Some(header) = detect_header(&sheet.rows, header_scan_rows) {
            columns.insert(sheet.name, header.field_columns());
        }
    }
    Ok(columns)
}

fn write_error(path: &Path, message: impl ToString) -> WriteBackError {
    WriteBackError::Write {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn write_csv(path: &Path, targets: &[(&CellWrite, usize)]) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| write_error(path, e))?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| write_error(path, e))?;
        rows.push(record.iter().map(String::from).collect());
    }

    for (write, col) in targets {
        let Some(row) = rows.get_mut(write.row - 1) else {
            return Err(write_error(path, format!("row {} is past the end of the file", write.row)).into());
        };
        if row.len() <= *col {
            row.resize(col + 1, String::new());
        }
        row[*col] = write.value.clone();
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| write_error(path, e))?;
    for row in &rows {
        writer.write_record(row).map_err(|e| write_error(path, e))?;
    }
    writer.flush().into_diagnostic()
}

fn write_workbook(path: &Path, targets: &[(&CellWrite, usize)]) -> Result<()> {
    let mut book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| write_error(path, e))?;
    for (write, col) in targets {
        let sheet = book
            .get_sheet_by_name_mut(&write.sheet)
            .ok_or_else(|| write_error(path, format!("sheet '{}' not found", write.sheet)))?;
        let cell = sheet.get_cell_mut((*col as u32 + 1, write.row as u32));
        match numeric_value(write.field, &write.value) {
            Some(number) => cell.set_value_number(number),
            None => cell.set_value_string(write.value.as_str()),
        };
    }
    umya_spreadsheet::writer::xlsx::write(&book, path).map_err(|e| write_error(path, e))?;
    Ok(())
}

/// Quantities and whole position numbers are stored as numbers
fn numeric_value(field: CanonicalField, value: &str) -> Option<f64> {
    match field {
        CanonicalField::Qty => parse_qty(value),
        CanonicalField::LineNo => value.parse::<i64>().ok().map(|v| v as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::tests::write_workbook;
    use crate::core::store::{BomLine, LinkReason};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, IndexConfig, BomStore) {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("BOMS")).unwrap();
        fs::create_dir_all(tmp.path().join("PDF")).unwrap();
        let mut config = IndexConfig::for_data_root(tmp.path());
        config.developer_mode = true;
        let store = BomStore::open(&config.db_path).unwrap();
        (tmp, config, store)
    }

    fn line_for(store: &BomStore, article: &str, part: &str) -> BomLine {
        let article = store.article_by_number(article).unwrap();
        store
            .article_lines(article.id)
            .into_iter()
            .find(|l| l.part_number == part)
            .unwrap()
    }

    #[test]
    fn test_csv_edit_is_written_and_reindexed() {
        let (tmp, config, store) = setup();
        let path = tmp.path().join("BOMS").join("BOM 100 Frame.csv");
        fs::write(
            &path,
            "Item,Part Number,Description,Qty,Rev\n1,P-1,Plate,2,A\n2,P-2,Bolt,4,\n",
        )
        .unwrap();
        run_index(&store, &config).unwrap();

        let bolt = line_for(&store, "100", "P-2");
        let edit = LineEdit::new(bolt.id)
            .set(CanonicalField::Revision, "c")
            .set(CanonicalField::Qty, "3");
        let summary = apply_line_edits(&store, &[edit], &config).unwrap();
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.cells_written, 2);
        assert_eq!(summary.index.as_ref().unwrap().boms_parsed, 1);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("1,P-1,Plate,2,A"));
        assert!(content.contains("2,P-2,Bolt,3,c"));

        let bolt = line_for(&store, "100", "P-2");
        assert_eq!(bolt.revision.as_deref(), Some("c"));
        assert_eq!(bolt.qty, Some(3.0));
        assert_eq!(store.line_count(), 2);
    }

    #[test]
    fn test_xlsx_edit_keeps_the_rest_of_the_workbook() {
        let (tmp, config, store) = setup();
        let path = tmp.path().join("BOMS").join("BOM 200 Knob.xlsx");
        write_workbook(
            &path,
            "Stuklijst",
            (2, 3),
            &[
                &["Pos", "Onderdeelnummer", "Omschrijving", "Aantal", "Versie"],
                &["10", "KNOB-001", "Knob", "1", ""],
                &["20", "PIN-002", "Pin", "2", "B"],
            ],
        );
        run_index(&store, &config).unwrap();

        let knob = line_for(&store, "200", "KNOB-001");
        assert_eq!(knob.source_row_number, Some(4));
        let edit = LineEdit::new(knob.id)
            .set(CanonicalField::Revision, "D")
            .set(CanonicalField::Qty, "2,5");
        let summary = apply_line_edits(&store, &[edit], &config).unwrap();
        assert_eq!(summary.cells_written, 2);

        let knob = line_for(&store, "200", "KNOB-001");
        assert_eq!(knob.revision.as_deref(), Some("D"));
        assert_eq!(knob.qty, Some(2.5));
        let pin = line_for(&store, "200", "PIN-002");
        assert_eq!(pin.revision.as_deref(), Some("B"));

        let sheets = read_sheets(&path).unwrap();
        assert_eq!(sheets[0].name, "Stuklijst");
        assert_eq!(sheets[0].rows[0][0].to_text(), "Bill of materials");
    }

    #[test]
    fn test_fields_without_a_column_are_skipped() {
        let (tmp, config, store) = setup();
        fs::write(
            tmp.path().join("BOMS").join("BOM 100.csv"),
            "Item,Part Number,Qty\n1,P-1,2\n",
        )
        .unwrap();
        run_index(&store, &config).unwrap();

        let line = line_for(&store, "100", "P-1");
        let edit = LineEdit::new(line.id).set(CanonicalField::Material, "Steel");
        let summary = apply_line_edits(&store, &[edit], &config).unwrap();
        assert_eq!(summary.fields_skipped, 1);
        assert_eq!(summary.files_written, 0);
        assert!(summary.index.is_none());
    }

    #[test]
    fn test_write_back_needs_developer_mode_and_a_known_line() {
        let (tmp, mut config, store) = setup();
        fs::write(tmp.path().join("BOMS").join("BOM 100.csv"), "Part Number,Qty\nP-1,2\n").unwrap();
        run_index(&store, &config).unwrap();
        let line = line_for(&store, "100", "P-1");

        assert!(apply_line_edits(&store, &[LineEdit::new(9999).set(CanonicalField::Qty, "1")], &config).is_err());

        config.developer_mode = false;
        let edit = LineEdit::new(line.id).set(CanonicalField::Qty, "5");
        let err = apply_line_edits(&store, &[edit], &config).unwrap_err();
        assert!(err.to_string().contains("developer mode"));
        assert_eq!(line_for(&store, "100", "P-1").qty, Some(2.0));
    }

    #[test]
    fn test_legacy_xls_is_not_writable() {
        let tmp = tempdir().unwrap();
        let xls = tmp.path().join("BOM 300.xls");
        fs::write(&xls, b"legacy").unwrap();
        assert!(matches!(check_writable(&xls), Err(WriteBackError::XlsUnsupported { .. })));
        assert!(matches!(
            check_writable(&tmp.path().join("gone.xlsx")),
            Err(WriteBackError::SourceMissing { .. })
        ));
        let csv = tmp.path().join("BOM 300.csv");
        fs::write(&csv, "Part Number\n").unwrap();
        assert!(check_writable(&csv).is_ok());
    }

    #[test]
    fn test_revision_suggestions_are_applied_and_documents_relinked() {
        let (tmp, config, store) = setup();
        fs::write(
            tmp.path().join("BOMS").join("BOM 100.csv"),
            "Item,Part Number,Description,Qty,Rev\n1,15-00407,Bracket,1,\n",
        )
        .unwrap();
        fs::write(tmp.path().join("PDF").join("15-00407_A.pdf"), b"%PDF").unwrap();
        fs::write(tmp.path().join("PDF").join("15-00407_C.pdf"), b"%PDF").unwrap();
        run_index(&store, &config).unwrap();
        let article = store.article_by_number("100").unwrap();

        let summary = apply_revision_suggestions(&store, article.id, &config).unwrap();
        assert_eq!(summary.cells_written, 1);
        assert_eq!(line_for(&store, "100", "15-00407").revision.as_deref(), Some("C"));

        let reason_of = |name: &str| {
            store
                .all_documents()
                .into_iter()
                .find(|d| d.filename == name)
                .and_then(|d| d.link_reason)
        };
        assert_eq!(reason_of("15-00407_C.pdf"), Some(LinkReason::MatchedPartAndRevision));
        assert_eq!(reason_of("15-00407_A.pdf"), Some(LinkReason::RevisionMismatch));

        // nothing left to suggest
        let again = apply_revision_suggestions(&store, article.id, &config).unwrap();
        assert_eq!(again.files_written, 0);
    }
}
