//! Query methods for reading the index
//!
//! Lookups return `Option`, listings return `Vec`; a failing statement reads
//! as "nothing found".

use std::collections::{HashMap, HashSet};

use rusqlite::{params, OptionalExtension, Params, Row};

use super::{
    Article, ArticleLink, ArticleSummary, BomLine, BomStore, DocType, Document, FileState,
    ImportIssue, ImportRun, LinkReason, LinkTarget, Part, PartType, PartUsage, RunStatus,
    Severity,
};
use crate::core::graph::{sort_bom_lines, ArticleRefIndex};

const ARTICLE_COLUMNS: &str = "id, article_number, title, source_bom_path, source_bom_filename, \
     source_bom_modified_at, source_bom_size_bytes, created_at, updated_at";

const LINE_COLUMNS: &str = "bl.id, bl.article_id, bl.part_id, p.part_number, bl.item_no, bl.line_no, \
     bl.qty, bl.unit, bl.revision, COALESCE(bl.description, p.description), bl.material, \
     bl.finish, bl.line_type, bl.status, bl.source_sheet, bl.source_row_number, bl.import_run_id";

const DOCUMENT_COLUMNS: &str = "id, path, filename, extension, size_bytes, modified_at, \
     linked_to_type, linked_id, doc_type, part_revision, link_reason, import_run_id";

const RUN_COLUMNS: &str = "id, started_at, finished_at, status, files_scanned, boms_parsed, \
     lines_imported, warnings_count, errors_count";

/// Filters for the article list
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    /// Substring to look for; blank lists everything
    pub text: String,
    pub limit: usize,
    /// Also match part numbers and descriptions of the article's lines
    pub search_in_children: bool,
    /// Hide articles used as a sub-assembly somewhere
    pub top_level_only: bool,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            limit: 500,
            search_in_children: true,
            top_level_only: false,
        }
    }
}

fn map_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        article_number: row.get(1)?,
        title: row.get(2)?,
        source_bom_path: row.get(3)?,
        source_bom_filename: row.get(4)?,
        source_bom_modified_at: row.get(5)?,
        source_bom_size_bytes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_line(row: &Row<'_>) -> rusqlite::Result<BomLine> {
    Ok(BomLine {
        id: row.get(0)?,
        article_id: row.get(1)?,
        part_id: row.get(2)?,
        part_number: row.get(3)?,
        item_no: row.get(4)?,
        line_no: row.get(5)?,
        qty: row.get(6)?,
        unit: row.get(7)?,
        revision: row.get(8)?,
        description: row.get(9)?,
        material: row.get(10)?,
        finish: row.get(11)?,
        line_type: row.get(12)?,
        status: row.get(13)?,
        source_sheet: row.get(14)?,
        source_row_number: row.get(15)?,
        import_run_id: row.get(16)?,
    })
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        extension: row.get(3)?,
        size_bytes: row.get(4)?,
        modified_at: row.get(5)?,
        linked_to_type: row
            .get::<_, Option<String>>(6)?
            .and_then(|t| LinkTarget::parse(&t)),
        linked_id: row.get(7)?,
        doc_type: row.get::<_, Option<String>>(8)?.map(|t| DocType::parse(&t)),
        part_revision: row.get(9)?,
        link_reason: row
            .get::<_, Option<String>>(10)?
            .and_then(|r| LinkReason::parse(&r)),
        import_run_id: row.get(11)?,
    })
}

fn map_part(row: &Row<'_>) -> rusqlite::Result<Part> {
    Ok(Part {
        id: row.get(0)?,
        part_number: row.get(1)?,
        description: row.get(2)?,
        part_type: row
            .get::<_, Option<String>>(3)?
            .and_then(|t| PartType::parse(&t)),
    })
}

fn map_run(row: &Row<'_>) -> rusqlite::Result<ImportRun> {
    Ok(ImportRun {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        status: RunStatus::parse(&row.get::<_, String>(3)?),
        files_scanned: row.get(4)?,
        boms_parsed: row.get(5)?,
        lines_imported: row.get(6)?,
        warnings_count: row.get(7)?,
        errors_count: row.get(8)?,
    })
}

fn map_usage(row: &Row<'_>) -> rusqlite::Result<PartUsage> {
    Ok(PartUsage {
        article_id: row.get(0)?,
        article_number: row.get(1)?,
        title: row.get(2)?,
        part_number: row.get(3)?,
        item_no: row.get(4)?,
        qty: row.get(5)?,
        revision: row.get(6)?,
        material: row.get(7)?,
    })
}

const USAGE_SELECT: &str = r#"SELECT a.id, a.article_number, a.title, p.part_number, bl.item_no,
                      bl.qty, bl.revision, bl.material
               FROM bom_lines bl
               JOIN parts p ON p.id = bl.part_id
               JOIN articles a ON a.id = bl.article_id"#;

impl BomStore {
    fn query_list<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Vec<T> {
        let mut stmt = match self.conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let rows = match stmt.query_map(params, map) {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        rows.filter_map(|r| r.ok()).collect()
    }

    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Option<T> {
        self.conn
            .query_row(sql, params, map)
            .optional()
            .ok()
            .flatten()
    }

    // =====================================================================
    // Articles
    // =====================================================================

    pub fn article(&self, id: i64) -> Option<Article> {
        self.query_one(
            &format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS),
            params![id],
            map_article,
        )
    }

    pub fn article_by_number(&self, article_number: &str) -> Option<Article> {
        self.query_one(
            &format!(
                "SELECT {} FROM articles WHERE article_number = ?1",
                ARTICLE_COLUMNS
            ),
            params![article_number.trim()],
            map_article,
        )
    }

    pub fn all_articles(&self) -> Vec<Article> {
        self.query_list(
            &format!(
                "SELECT {} FROM articles ORDER BY article_number",
                ARTICLE_COLUMNS
            ),
            [],
            map_article,
        )
    }

    /// Recorded source stamps keyed by source path
    pub fn article_sources(&self) -> HashMap<String, FileState> {
        self.query_list(
            r#"SELECT source_bom_path, COALESCE(source_bom_modified_at, ''),
                      COALESCE(source_bom_size_bytes, -1)
               FROM articles WHERE source_bom_path IS NOT NULL"#,
            [],
            |row| {
                Ok(FileState {
                    path: row.get(0)?,
                    modified_at: row.get(1)?,
                    size_bytes: row.get(2)?,
                })
            },
        )
        .into_iter()
        .map(|state| (state.path.clone(), state))
        .collect()
    }

    /// List articles with an optional text filter
    pub fn list_articles(&self, query: &ArticleQuery) -> Vec<ArticleSummary> {
        let text = query.text.trim();
        let mut sql = String::from(
            r#"SELECT a.id, a.article_number, a.title, COUNT(DISTINCT bl.id)
               FROM articles a
               LEFT JOIN bom_lines bl ON bl.article_id = a.id
               LEFT JOIN parts p ON p.id = bl.part_id"#,
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if !text.is_empty() {
            let pattern = format!("%{}%", text);
            if query.search_in_children {
                sql.push_str(
                    r#" WHERE a.id IN (
                        SELECT a2.id FROM articles a2
                        LEFT JOIN bom_lines bl2 ON bl2.article_id = a2.id
                        LEFT JOIN parts p2 ON p2.id = bl2.part_id
                        WHERE a2.article_number LIKE ?1 OR COALESCE(a2.title, '') LIKE ?1
                           OR COALESCE(p2.part_number, '') LIKE ?1
                           OR COALESCE(p2.description, '') LIKE ?1)"#,
                );
            } else {
                sql.push_str(" WHERE (a.article_number LIKE ?1 OR COALESCE(a.title, '') LIKE ?1)");
            }
            params_vec.push(Box::new(pattern));
        }

        sql.push_str(" GROUP BY a.id, a.article_number, a.title ORDER BY a.article_number");

        // Top-level filtering happens after the query, so the limit must too
        if !query.top_level_only {
            sql.push_str(&format!(" LIMIT {}", query.limit));
        }

        let rows = self.query_list(
            &sql,
            rusqlite::params_from_iter(params_vec.iter()),
            |row| {
                Ok(ArticleSummary {
                    id: row.get(0)?,
                    article_number: row.get(1)?,
                    title: row.get(2)?,
                    bom_line_count: row.get(3)?,
                })
            },
        );

        if !query.top_level_only {
            return rows;
        }
        let used = self.subassembly_article_ids();
        rows.into_iter()
            .filter(|a| !used.contains(&a.id))
            .take(query.limit)
            .collect()
    }

    /// Articles referenced as a sub-assembly by some other article
    pub fn subassembly_article_ids(&self) -> HashSet<i64> {
        let refs = ArticleRefIndex::load(self);
        self.query_list(
            r#"SELECT DISTINCT bl.article_id, p.part_number
               FROM bom_lines bl JOIN parts p ON p.id = bl.part_id"#,
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .into_iter()
        .filter_map(|(owner, part_number)| {
            refs.resolve(&part_number).filter(|id| *id != owner)
        })
        .collect()
    }

    /// Sub-assembly articles referenced by an article's lines
    pub fn child_articles(&self, article_id: i64) -> Vec<ArticleLink> {
        let refs = ArticleRefIndex::load(self);
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for line in self.article_lines(article_id) {
            let Some(child_id) = refs.resolve(&line.part_number) else {
                continue;
            };
            if child_id == article_id || !seen.insert(child_id) {
                continue;
            }
            if let Some(child) = self.article(child_id) {
                links.push(ArticleLink {
                    article_id: child.id,
                    article_number: child.article_number,
                    title: child.title,
                    item_no: line.item_no,
                    part_number: line.part_number,
                    qty: line.qty,
                    revision: line.revision,
                });
            }
        }
        links
    }

    /// Articles whose lines reference this article as a sub-assembly
    pub fn parent_articles(&self, article_id: i64) -> Vec<ArticleLink> {
        let refs = ArticleRefIndex::load(self);
        let articles: HashMap<i64, Article> = self
            .all_articles()
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut links: Vec<ArticleLink> = self
            .all_bom_lines()
            .into_iter()
            .filter(|line| line.article_id != article_id)
            .filter(|line| refs.resolve(&line.part_number) == Some(article_id))
            .filter_map(|line| {
                let parent = articles.get(&line.article_id)?;
                Some(ArticleLink {
                    article_id: parent.id,
                    article_number: parent.article_number.clone(),
                    title: parent.title.clone(),
                    item_no: line.item_no,
                    part_number: line.part_number,
                    qty: line.qty,
                    revision: line.revision,
                })
            })
            .collect();
        links.sort_by(|a, b| {
            a.article_number
                .cmp(&b.article_number)
                .then_with(|| a.item_no.cmp(&b.item_no))
        });
        links
    }

    // =====================================================================
    // BOM lines
    // =====================================================================

    /// An article's lines in item-number order
    pub fn article_lines(&self, article_id: i64) -> Vec<BomLine> {
        let mut lines = self.query_list(
            &format!(
                r#"SELECT {} FROM bom_lines bl JOIN parts p ON p.id = bl.part_id
                   WHERE bl.article_id = ?1 ORDER BY bl.id"#,
                LINE_COLUMNS
            ),
            params![article_id],
            map_line,
        );
        sort_bom_lines(&mut lines);
        lines
    }

    /// Every BOM line in insertion order
    pub fn all_bom_lines(&self) -> Vec<BomLine> {
        self.query_list(
            &format!(
                "SELECT {} FROM bom_lines bl JOIN parts p ON p.id = bl.part_id ORDER BY bl.id",
                LINE_COLUMNS
            ),
            [],
            map_line,
        )
    }

    pub fn bom_line(&self, line_id: i64) -> Option<BomLine> {
        self.query_one(
            &format!(
                "SELECT {} FROM bom_lines bl JOIN parts p ON p.id = bl.part_id WHERE bl.id = ?1",
                LINE_COLUMNS
            ),
            params![line_id],
            map_line,
        )
    }

    pub fn line_count(&self) -> i64 {
        self.query_one("SELECT COUNT(*) FROM bom_lines", [], |row| row.get(0))
            .unwrap_or(0)
    }

    // =====================================================================
    // Parts
    // =====================================================================

    pub fn part(&self, id: i64) -> Option<Part> {
        self.query_one(
            "SELECT id, part_number, description, part_type FROM parts WHERE id = ?1",
            params![id],
            map_part,
        )
    }

    /// Case-insensitive lookup by part number
    pub fn part_by_number(&self, part_number: &str) -> Option<Part> {
        self.query_one(
            "SELECT id, part_number, description, part_type FROM parts WHERE part_number = ?1",
            params![part_number.trim().to_uppercase()],
            map_part,
        )
    }

    pub fn all_parts(&self) -> Vec<Part> {
        self.query_list(
            "SELECT id, part_number, description, part_type FROM parts ORDER BY part_number",
            [],
            map_part,
        )
    }

    /// (part id, revision) of every BOM line
    pub fn part_line_revisions(&self) -> Vec<(i64, Option<String>)> {
        self.query_list(
            "SELECT part_id, revision FROM bom_lines ORDER BY id",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    /// Every line using a part
    pub fn part_usages(&self, part_id: i64) -> Vec<PartUsage> {
        self.query_list(
            &format!(
                "{} WHERE bl.part_id = ?1 ORDER BY a.article_number, bl.item_no",
                USAGE_SELECT
            ),
            params![part_id],
            map_usage,
        )
    }

    /// Every line whose part number equals `part_number`, ignoring case
    pub fn articles_using_part_number(&self, part_number: &str) -> Vec<PartUsage> {
        let value = part_number.trim();
        if value.is_empty() {
            return vec![];
        }
        self.query_list(
            &format!(
                "{} WHERE UPPER(p.part_number) = UPPER(?1) ORDER BY a.article_number, bl.item_no",
                USAGE_SELECT
            ),
            params![value],
            map_usage,
        )
    }

    // =====================================================================
    // Documents
    // =====================================================================

    /// Documents linked to an article or part, by filename
    pub fn documents_for(&self, target: LinkTarget, id: i64) -> Vec<Document> {
        self.query_list(
            &format!(
                r#"SELECT {} FROM documents
                   WHERE linked_to_type = ?1 AND linked_id = ?2 ORDER BY filename"#,
                DOCUMENT_COLUMNS
            ),
            params![target.as_str(), id],
            map_document,
        )
    }

    /// Documents of a part for one revision, or all of the part's documents
    /// when the revision is blank or has none
    pub fn documents_for_part_revision(&self, part_id: i64, revision: Option<&str>) -> Vec<Document> {
        if let Some(rev) = revision.map(str::trim).filter(|r| !r.is_empty()) {
            let docs = self.query_list(
                &format!(
                    r#"SELECT {} FROM documents
                       WHERE linked_to_type = 'part' AND linked_id = ?1
                         AND UPPER(COALESCE(part_revision, '')) = ?2
                       ORDER BY filename"#,
                    DOCUMENT_COLUMNS
                ),
                params![part_id, rev.to_uppercase()],
                map_document,
            );
            if !docs.is_empty() {
                return docs;
            }
        }
        self.documents_for(LinkTarget::Part, part_id)
    }

    /// Documents without a link, with their reason codes
    pub fn unlinked_documents(&self, limit: usize) -> Vec<Document> {
        self.query_list(
            &format!(
                r#"SELECT {} FROM documents WHERE linked_to_type IS NULL
                   ORDER BY filename LIMIT ?1"#,
                DOCUMENT_COLUMNS
            ),
            params![limit as i64],
            map_document,
        )
    }

    pub fn all_documents(&self) -> Vec<Document> {
        self.query_list(
            &format!("SELECT {} FROM documents ORDER BY path", DOCUMENT_COLUMNS),
            [],
            map_document,
        )
    }

    /// Documents whose filename contains `fragment`, ignoring case
    pub fn documents_with_filename_containing(&self, fragment: &str) -> Vec<Document> {
        self.query_list(
            &format!(
                r#"SELECT {} FROM documents WHERE UPPER(filename) LIKE ?1
                   ORDER BY filename"#,
                DOCUMENT_COLUMNS
            ),
            params![format!("%{}%", fragment.trim().to_uppercase())],
            map_document,
        )
    }

    // =====================================================================
    // Import runs
    // =====================================================================

    pub fn latest_import_run(&self) -> Option<ImportRun> {
        self.query_one(
            &format!("SELECT {} FROM import_runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
            [],
            map_run,
        )
    }

    /// Most recent runs first
    pub fn import_runs(&self, limit: usize) -> Vec<ImportRun> {
        self.query_list(
            &format!(
                "SELECT {} FROM import_runs ORDER BY id DESC LIMIT ?1",
                RUN_COLUMNS
            ),
            params![limit as i64],
            map_run,
        )
    }

    pub fn import_issues(&self, run_id: i64) -> Vec<ImportIssue> {
        self.query_list(
            r#"SELECT id, import_run_id, severity, file_path, sheet_name, row_number, message, raw_row_json
               FROM import_issues WHERE import_run_id = ?1 ORDER BY id"#,
            params![run_id],
            |row| {
                Ok(ImportIssue {
                    id: row.get(0)?,
                    import_run_id: row.get(1)?,
                    severity: Severity::parse(&row.get::<_, String>(2)?),
                    file_path: row.get(3)?,
                    sheet_name: row.get(4)?,
                    row_number: row.get(5)?,
                    message: row.get(6)?,
                    raw_row_json: row.get(7)?,
                })
            },
        )
    }
}
