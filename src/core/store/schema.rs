//! Database schema initialization and additive migrations

use std::collections::HashSet;

use miette::{IntoDiagnostic, Result};

use super::BomStore;

/// Columns added after the first schema; each is created when missing
const COLUMN_MIGRATIONS: &[(&str, &str, &str)] = &[
    ("articles", "source_bom_modified_at", "TEXT"),
    ("articles", "source_bom_size_bytes", "INTEGER"),
    ("bom_lines", "item_no", "TEXT"),
    ("bom_lines", "finish", "TEXT"),
    ("bom_lines", "line_type", "TEXT"),
    ("bom_lines", "status", "TEXT"),
    ("documents", "part_revision", "TEXT"),
    ("documents", "link_reason", "TEXT"),
];

impl BomStore {
    /// Create missing tables and columns. Safe to run on every open.
    pub(super) fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_number TEXT NOT NULL UNIQUE,
                title TEXT,
                source_bom_filename TEXT,
                source_bom_path TEXT,
                created_at TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS parts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                part_number TEXT NOT NULL UNIQUE,
                description TEXT,
                part_type TEXT,
                created_at TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS import_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT,
                finished_at TEXT,
                status TEXT NOT NULL,
                files_scanned INTEGER NOT NULL DEFAULT 0,
                boms_parsed INTEGER NOT NULL DEFAULT 0,
                lines_imported INTEGER NOT NULL DEFAULT 0,
                warnings_count INTEGER NOT NULL DEFAULT 0,
                errors_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS bom_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                part_id INTEGER NOT NULL,
                line_no INTEGER,
                qty REAL,
                unit TEXT,
                revision TEXT,
                description TEXT,
                material TEXT,
                raw_columns_json TEXT,
                source_sheet TEXT,
                source_row_number INTEGER,
                import_run_id INTEGER,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
                FOREIGN KEY (part_id) REFERENCES parts(id),
                FOREIGN KEY (import_run_id) REFERENCES import_runs(id)
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                linked_to_type TEXT,
                linked_id INTEGER,
                doc_type TEXT,
                filename TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                extension TEXT,
                size_bytes INTEGER,
                modified_at TEXT,
                import_run_id INTEGER,
                FOREIGN KEY (import_run_id) REFERENCES import_runs(id)
            );

            CREATE TABLE IF NOT EXISTS import_issues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                import_run_id INTEGER NOT NULL,
                severity TEXT NOT NULL,
                file_path TEXT,
                sheet_name TEXT,
                row_number INTEGER,
                message TEXT NOT NULL,
                raw_row_json TEXT,
                FOREIGN KEY (import_run_id) REFERENCES import_runs(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_bom_article ON bom_lines(article_id);
            CREATE INDEX IF NOT EXISTS idx_bom_part ON bom_lines(part_id);
            CREATE INDEX IF NOT EXISTS idx_documents_link ON documents(linked_to_type, linked_id);
            CREATE INDEX IF NOT EXISTS idx_issues_run ON import_issues(import_run_id);
            "#,
            )
            .into_diagnostic()?;

        for (table, column, sql_type) in COLUMN_MIGRATIONS {
            self.ensure_column(table, column, sql_type)?;
        }

        Ok(())
    }

    fn table_columns(&self, table: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .into_diagnostic()?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .into_diagnostic()?
            .filter_map(|r| r.ok())
            .collect();
        Ok(columns)
    }

    fn ensure_column(&self, table: &str, column: &str, sql_type: &str) -> Result<()> {
        if !self.table_columns(table)?.contains(column) {
            self.conn
                .execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, sql_type
                ))
                .into_diagnostic()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::tempdir;

    #[test]
    fn test_init_schema_is_idempotent() {
        let store = BomStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.init_schema().unwrap();
        let columns = store.table_columns("bom_lines").unwrap();
        assert!(columns.contains("item_no"));
        assert!(columns.contains("finish"));
    }

    #[test]
    fn test_old_schema_gets_missing_columns_without_losing_rows() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("old.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE articles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    article_number TEXT NOT NULL UNIQUE,
                    title TEXT,
                    source_bom_filename TEXT,
                    source_bom_path TEXT,
                    created_at TEXT,
                    updated_at TEXT
                );
                INSERT INTO articles (article_number, title) VALUES ('17004', 'Leva');
                CREATE TABLE documents (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    linked_to_type TEXT,
                    linked_id INTEGER,
                    doc_type TEXT,
                    filename TEXT NOT NULL,
                    path TEXT NOT NULL UNIQUE,
                    extension TEXT,
                    size_bytes INTEGER,
                    modified_at TEXT,
                    import_run_id INTEGER
                );
                "#,
            )
            .unwrap();
        }

        let store = BomStore::open(&db).unwrap();
        assert!(store
            .table_columns("documents")
            .unwrap()
            .contains("link_reason"));
        assert!(store
            .table_columns("articles")
            .unwrap()
            .contains("source_bom_size_bytes"));
        let article = store.article_by_number("17004").unwrap();
        assert_eq!(article.title.as_deref(), Some("Leva"));
    }
}
