//! Mutating store operations
//!
//! Every write that belongs to one BOM file goes through `replace_article`,
//! which swaps the article's full line set inside a single transaction.

use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension};

use super::{
    now_timestamp, BomStore, DocumentRecord, FileState, NewIssue, PartType, ReplaceOutcome,
    RunCounters, RunStatus, Severity, StoreError,
};
use crate::core::parser::{ParsedBom, ParsedLine};

impl BomStore {
    /// Run `f` inside one transaction; an error rolls everything back
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction().into_diagnostic()?;
        let value = f(self)?;
        tx.commit().into_diagnostic()?;
        Ok(value)
    }

    // =====================================================================
    // Import runs
    // =====================================================================

    /// Open a new import run in the `running` state
    pub fn start_import_run(&self) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO import_runs (started_at, status) VALUES (?1, ?2)",
                params![now_timestamp(), RunStatus::Running.as_str()],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Close an import run with its final status and counters
    pub fn finish_import_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> Result<()> {
        self.conn
            .execute(
                r#"UPDATE import_runs
                   SET finished_at = ?1, status = ?2, files_scanned = ?3, boms_parsed = ?4,
                       lines_imported = ?5, warnings_count = ?6, errors_count = ?7
                   WHERE id = ?8"#,
                params![
                    now_timestamp(),
                    status.as_str(),
                    counters.files_scanned,
                    counters.boms_parsed,
                    counters.lines_imported,
                    counters.warnings_count,
                    counters.errors_count,
                    run_id
                ],
            )
            .into_diagnostic()?;
        Ok(())
    }

    /// Record a warning or error against a run
    pub fn log_issue(&self, run_id: i64, severity: Severity, issue: &NewIssue<'_>) -> Result<()> {
        let raw_row_json = issue
            .raw_row
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .into_diagnostic()?;
        self.conn
            .execute(
                r#"INSERT INTO import_issues
                   (import_run_id, severity, file_path, sheet_name, row_number, message, raw_row_json)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    run_id,
                    severity.as_str(),
                    issue.file_path,
                    issue.sheet_name,
                    issue.row_number,
                    issue.message,
                    raw_row_json
                ],
            )
            .into_diagnostic()?;
        Ok(())
    }

    // =====================================================================
    // Articles, parts and lines
    // =====================================================================

    /// Insert or update an article by number, returning its id
    pub fn upsert_article(
        &self,
        article_number: &str,
        title: Option<&str>,
        source: &FileState,
        source_filename: &str,
    ) -> Result<i64> {
        let now = now_timestamp();
        self.conn
            .execute(
                r#"INSERT INTO articles
                   (article_number, title, source_bom_filename, source_bom_path,
                    source_bom_modified_at, source_bom_size_bytes, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                   ON CONFLICT(article_number) DO UPDATE SET
                       title = excluded.title,
                       source_bom_filename = excluded.source_bom_filename,
                       source_bom_path = excluded.source_bom_path,
                       source_bom_modified_at = excluded.source_bom_modified_at,
                       source_bom_size_bytes = excluded.source_bom_size_bytes,
                       updated_at = excluded.updated_at"#,
                params![
                    article_number,
                    title,
                    source_filename,
                    source.path,
                    source.modified_at,
                    source.size_bytes,
                    now
                ],
            )
            .into_diagnostic()?;

        self.conn
            .query_row(
                "SELECT id FROM articles WHERE article_number = ?1",
                params![article_number],
                |row| row.get(0),
            )
            .into_diagnostic()
    }

    /// Insert a part or fill in its description when it has none, returning its id
    pub fn upsert_part(&self, part_number: &str, description: Option<&str>) -> Result<i64> {
        let now = now_timestamp();
        self.conn
            .execute(
                r#"INSERT INTO parts (part_number, description, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?3)
                   ON CONFLICT(part_number) DO UPDATE SET
                       description = COALESCE(NULLIF(parts.description, ''), excluded.description),
                       updated_at = excluded.updated_at"#,
                params![part_number, description, now],
            )
            .into_diagnostic()?;

        self.conn
            .query_row(
                "SELECT id FROM parts WHERE part_number = ?1",
                params![part_number],
                |row| row.get(0),
            )
            .into_diagnostic()
    }

    /// Insert one BOM line. Lines are never updated in place.
    pub fn insert_bom_line(
        &self,
        article_id: i64,
        part_id: i64,
        run_id: i64,
        line: &ParsedLine,
    ) -> Result<i64> {
        let raw_columns_json = serde_json::to_string(&line.raw_columns).into_diagnostic()?;
        self.conn
            .execute(
                r#"INSERT INTO bom_lines
                   (article_id, part_id, item_no, line_no, qty, unit, revision, description,
                    material, finish, line_type, status, raw_columns_json, source_sheet,
                    source_row_number, import_run_id)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#,
                params![
                    article_id,
                    part_id,
                    line.item_no,
                    line.line_no,
                    line.qty,
                    line.unit,
                    line.revision,
                    line.description,
                    line.material,
                    line.finish,
                    line.line_type,
                    line.status,
                    raw_columns_json,
                    line.source_sheet,
                    line.source_row_number as i64,
                    run_id
                ],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Replace an article's complete line set from a parsed BOM.
    ///
    /// Rows without a part number are skipped and logged as warnings. Either
    /// the whole new line set becomes visible or the previous one stays.
    pub fn replace_article(
        &self,
        run_id: i64,
        parsed: &ParsedBom,
        source: &FileState,
    ) -> Result<ReplaceOutcome> {
        let filename = parsed
            .source_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        self.transaction(|store| {
            let article_id = store.upsert_article(
                &parsed.article_number,
                Some(parsed.article_title.as_str()),
                source,
                &filename,
            )?;
            store
                .conn
                .execute(
                    "DELETE FROM bom_lines WHERE article_id = ?1",
                    params![article_id],
                )
                .into_diagnostic()?;

            let mut outcome = ReplaceOutcome {
                article_id,
                ..Default::default()
            };
            for line in &parsed.lines {
                let part_number = line.part_number.trim().to_uppercase();
                if part_number.is_empty() {
                    store.log_issue(
                        run_id,
                        Severity::Warning,
                        &NewIssue {
                            file_path: Some(source.path.as_str()),
                            sheet_name: Some(line.source_sheet.as_str()),
                            row_number: Some(line.source_row_number as i64),
                            message: "Skipped BOM row without part number",
                            raw_row: serde_json::to_value(line).ok(),
                        },
                    )?;
                    outcome.rows_skipped += 1;
                    continue;
                }
                let part_id = store.upsert_part(&part_number, line.description.as_deref())?;
                store.insert_bom_line(article_id, part_id, run_id, line)?;
                outcome.lines_inserted += 1;
            }
            Ok(outcome)
        })
    }

    /// Remove an article, its lines and the documents linked to it
    pub fn delete_article(&self, article_id: i64) -> Result<()> {
        self.transaction(|store| {
            store
                .conn
                .execute(
                    "DELETE FROM documents WHERE linked_to_type = 'article' AND linked_id = ?1",
                    params![article_id],
                )
                .into_diagnostic()?;
            store
                .conn
                .execute(
                    "DELETE FROM bom_lines WHERE article_id = ?1",
                    params![article_id],
                )
                .into_diagnostic()?;
            store
                .conn
                .execute("DELETE FROM articles WHERE id = ?1", params![article_id])
                .into_diagnostic()?;
            Ok(())
        })
    }

    /// Set or clear a part's classification
    pub fn update_part_type(&self, part_id: i64, part_type: Option<&str>) -> Result<()> {
        let normalized = match part_type.map(str::trim).filter(|v| !v.is_empty()) {
            None => None,
            Some(value) => Some(
                PartType::parse(value)
                    .ok_or_else(|| StoreError::InvalidPartType(value.to_string()))?,
            ),
        };

        let updated = self
            .conn
            .execute(
                "UPDATE parts SET part_type = ?1, updated_at = ?2 WHERE id = ?3",
                params![normalized.map(|t| t.as_str()), now_timestamp(), part_id],
            )
            .into_diagnostic()?;
        if updated == 0 {
            return Err(StoreError::PartNotFound(part_id).into());
        }
        Ok(())
    }

    // =====================================================================
    // Documents
    // =====================================================================

    /// Insert or update a document by path, returning its id
    pub fn upsert_document(&self, run_id: i64, doc: &DocumentRecord) -> Result<i64> {
        let (linked_to_type, linked_id) = match doc.link {
            Some((target, id)) => (Some(target.as_str()), Some(id)),
            None => (None, None),
        };
        let doc_type = super::DocType::from_extension(&doc.extension);

        self.conn
            .execute(
                r#"INSERT INTO documents
                   (path, filename, extension, size_bytes, modified_at, import_run_id,
                    linked_to_type, linked_id, doc_type, part_revision, link_reason)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                   ON CONFLICT(path) DO UPDATE SET
                       filename = excluded.filename,
                       extension = excluded.extension,
                       size_bytes = excluded.size_bytes,
                       modified_at = excluded.modified_at,
                       import_run_id = excluded.import_run_id,
                       linked_to_type = excluded.linked_to_type,
                       linked_id = excluded.linked_id,
                       doc_type = excluded.doc_type,
                       part_revision = excluded.part_revision,
                       link_reason = excluded.link_reason"#,
                params![
                    doc.file.path,
                    doc.filename,
                    doc.extension,
                    doc.file.size_bytes,
                    doc.file.modified_at,
                    run_id,
                    linked_to_type,
                    linked_id,
                    doc_type.as_str(),
                    doc.part_revision,
                    doc.link_reason.map(|r| r.as_str())
                ],
            )
            .into_diagnostic()?;

        self.conn
            .query_row(
                "SELECT id FROM documents WHERE path = ?1",
                params![doc.file.path],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()?
            .ok_or_else(|| miette::miette!("document {} vanished after upsert", doc.file.path))
    }

    /// Delete documents by id, returning how many rows went away
    pub fn delete_documents(&self, ids: &[i64]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            removed += self
                .conn
                .execute("DELETE FROM documents WHERE id = ?1", params![id])
                .into_diagnostic()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{LinkReason, LinkTarget};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn line(part: &str, item_no: &str, revision: Option<&str>) -> ParsedLine {
        ParsedLine {
            part_number: part.to_string(),
            description: Some(format!("{} description", part)),
            qty: Some(1.0),
            revision: revision.map(String::from),
            material: None,
            finish: None,
            line_type: None,
            status: None,
            unit: None,
            item_no: Some(item_no.to_string()),
            line_no: None,
            raw_columns: BTreeMap::new(),
            source_sheet: "BOM".to_string(),
            source_row_number: 2,
        }
    }

    fn bom(article: &str, lines: Vec<ParsedLine>) -> ParsedBom {
        ParsedBom {
            article_number: article.to_string(),
            article_title: "Frame".to_string(),
            lines,
            source_file: PathBuf::from(format!("/data/BOMS/BOM {} Frame.xlsx", article)),
        }
    }

    fn state(article: &str) -> FileState {
        FileState {
            path: format!("/data/BOMS/BOM {} Frame.xlsx", article),
            modified_at: "2024-01-01T00:00:00.000000Z".to_string(),
            size_bytes: 100,
        }
    }

    #[test]
    fn test_replace_article_swaps_line_set() {
        let store = BomStore::open_in_memory().unwrap();
        let run = store.start_import_run().unwrap();

        let first = store
            .replace_article(run, &bom("100", vec![line("a-1", "1", None), line("B-2", "2", None)]), &state("100"))
            .unwrap();
        assert_eq!(first.lines_inserted, 2);

        let second = store
            .replace_article(run, &bom("100", vec![line("C-3", "1", Some("A"))]), &state("100"))
            .unwrap();
        assert_eq!(second.article_id, first.article_id);

        let lines = store.article_lines(first.article_id);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].part_number, "C-3");
        // Parts persist when no longer referenced
        assert!(store.part_by_number("A-1").is_some());
    }

    #[test]
    fn test_blank_part_number_is_logged_and_skipped() {
        let store = BomStore::open_in_memory().unwrap();
        let run = store.start_import_run().unwrap();
        let outcome = store
            .replace_article(run, &bom("100", vec![line("  ", "1", None), line("P-1", "2", None)]), &state("100"))
            .unwrap();
        assert_eq!(outcome.lines_inserted, 1);
        assert_eq!(outcome.rows_skipped, 1);

        let issues = store.import_issues(run);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].row_number, Some(2));
        assert!(issues[0].raw_row_json.is_some());
    }

    #[test]
    fn test_upsert_part_only_fills_missing_description() {
        let store = BomStore::open_in_memory().unwrap();
        let id = store.upsert_part("P-1", None).unwrap();
        assert_eq!(store.upsert_part("P-1", Some("Bracket")).unwrap(), id);
        store.upsert_part("P-1", Some("Renamed")).unwrap();
        let part = store.part_by_number("P-1").unwrap();
        assert_eq!(part.description.as_deref(), Some("Bracket"));
    }

    #[test]
    fn test_update_part_type() {
        let store = BomStore::open_in_memory().unwrap();
        let id = store.upsert_part("P-1", None).unwrap();

        store.update_part_type(id, Some(" Fastener")).unwrap();
        assert_eq!(store.part(id).unwrap().part_type, Some(PartType::Fastener));

        store.update_part_type(id, Some("")).unwrap();
        assert_eq!(store.part(id).unwrap().part_type, None);

        let err = store.update_part_type(id, Some("widget")).unwrap_err();
        assert!(err.to_string().contains("widget"));
        assert!(store.update_part_type(9999, None).is_err());
    }

    #[test]
    fn test_delete_article_keeps_part_documents() {
        let store = BomStore::open_in_memory().unwrap();
        let run = store.start_import_run().unwrap();
        let outcome = store
            .replace_article(run, &bom("100", vec![line("P-1", "1", None)]), &state("100"))
            .unwrap();
        let part_id = store.part_by_number("P-1").unwrap().id;

        let doc = |name: &str, link| DocumentRecord {
            file: FileState {
                path: format!("/data/PDF/{}", name),
                modified_at: "2024-01-01T00:00:00.000000Z".to_string(),
                size_bytes: 1,
            },
            filename: name.to_string(),
            extension: ".pdf".to_string(),
            link: Some(link),
            part_revision: None,
            link_reason: Some(LinkReason::MatchedArticle),
        };
        store
            .upsert_document(run, &doc("100 overview.pdf", (LinkTarget::Article, outcome.article_id)))
            .unwrap();
        store
            .upsert_document(run, &doc("P-1.pdf", (LinkTarget::Part, part_id)))
            .unwrap();

        store.delete_article(outcome.article_id).unwrap();
        assert!(store.article(outcome.article_id).is_none());
        assert!(store.article_lines(outcome.article_id).is_empty());
        let remaining = store.all_documents();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].filename, "P-1.pdf");
    }

    #[test]
    fn test_finish_import_run_records_counters() {
        let store = BomStore::open_in_memory().unwrap();
        let run = store.start_import_run().unwrap();
        store
            .finish_import_run(
                run,
                RunStatus::CompletedWithWarnings,
                &RunCounters {
                    files_scanned: 3,
                    boms_parsed: 2,
                    lines_imported: 10,
                    warnings_count: 1,
                    errors_count: 0,
                },
            )
            .unwrap();
        let latest = store.latest_import_run().unwrap();
        assert_eq!(latest.id, run);
        assert_eq!(latest.status, RunStatus::CompletedWithWarnings);
        assert_eq!(latest.lines_imported, 10);
        assert!(latest.finished_at.is_some());
    }
}
