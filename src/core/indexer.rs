//! Index reconciliation
//!
//! One pass brings the store in line with the data root:
//! - changed or new BOM files are parsed and their article's lines replaced
//! - articles whose BOM file disappeared are pruned
//! - document folders are scanned and new or changed files matched to parts
//! - documents that are gone from disk are pruned
//!
//! Failures tied to a single file are recorded as run issues and never stop
//! the pass. Only a missing or unreadable BOM folder fails the run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use miette::{Diagnostic, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::IndexConfig;
use crate::core::matching::{match_document, PartCatalog};
use crate::core::parser::{extract_article_from_filename, is_bom_file, parse_bom_file};
use crate::core::store::{
    file_state, BomStore, Document, DocumentRecord, FileState, NewIssue, RunCounters, RunStatus,
    Severity,
};

/// Conditions that fail a whole index run
#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("BOM folder not found: {path}")]
    #[diagnostic(
        code(bomdex::index::bom_root_missing),
        help("the data root must contain a '{folder}' folder, check --data-root or bom_folder")
    )]
    BomRootMissing { path: PathBuf, folder: String },

    #[error("BOM folder {path} cannot be read: {message}")]
    #[diagnostic(code(bomdex::index::bom_root_unreadable))]
    BomRootUnreadable { path: PathBuf, message: String },
}

/// Statistics of one index run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub run_id: i64,
    pub status: RunStatus,
    pub files_scanned: i64,
    pub boms_parsed: i64,
    pub boms_unchanged: i64,
    pub lines_imported: i64,
    pub articles_removed: i64,
    pub documents_scanned: i64,
    pub documents_updated: i64,
    pub documents_linked: i64,
    pub documents_removed: i64,
    pub warnings_count: i64,
    pub errors_count: i64,
}

impl IndexStats {
    fn counters(&self) -> RunCounters {
        RunCounters {
            files_scanned: self.files_scanned,
            boms_parsed: self.boms_parsed,
            lines_imported: self.lines_imported,
            warnings_count: self.warnings_count,
            errors_count: self.errors_count,
        }
    }

    fn final_status(&self) -> RunStatus {
        if self.warnings_count > 0 || self.errors_count > 0 {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Completed
        }
    }
}

/// Run one indexing pass over `config.data_root`
pub fn run_index(store: &BomStore, config: &IndexConfig) -> Result<IndexStats> {
    let run_id = store.start_import_run()?;
    info!(run_id, data_root = %config.data_root.display(), "index run started");

    let mut pass = IndexPass {
        store,
        config,
        stats: IndexStats {
            run_id,
            ..Default::default()
        },
    };

    match pass.run() {
        Ok(()) => {
            let mut stats = pass.stats;
            stats.status = stats.final_status();
            store.finish_import_run(run_id, stats.status, &stats.counters())?;
            info!(
                run_id,
                status = stats.status.as_str(),
                files = stats.files_scanned,
                parsed = stats.boms_parsed,
                lines = stats.lines_imported,
                warnings = stats.warnings_count,
                errors = stats.errors_count,
                "index run finished"
            );
            Ok(stats)
        }
        Err(err) => {
            warn!(run_id, error = %err, "index run failed");
            if let Err(close_err) =
                store.finish_import_run(run_id, RunStatus::Failed, &pass.stats.counters())
            {
                warn!(run_id, error = %close_err, "could not close failed run");
            }
            Err(err)
        }
    }
}

struct IndexPass<'a> {
    store: &'a BomStore,
    config: &'a IndexConfig,
    stats: IndexStats,
}

impl IndexPass<'_> {
    fn run(&mut self) -> Result<()> {
        let bom_root = self.bom_root()?;
        let files = self.discover_boms(&bom_root)?;
        self.index_boms(files)?;
        self.prune_articles(&bom_root)?;

        let force_relink = self.stats.boms_parsed > 0 || self.stats.articles_removed > 0;
        let document_roots = existing_roots(&self.config.document_roots());
        let seen = self.index_documents(&document_roots, force_relink)?;
        self.prune_documents(&document_roots, &seen)?;
        Ok(())
    }

    fn bom_root(&self) -> Result<PathBuf> {
        let root = self.config.bom_root();
        if !root.is_dir() {
            return Err(IndexError::BomRootMissing {
                path: root,
                folder: self.config.bom_folder.clone(),
            }
            .into());
        }
        fs::canonicalize(&root).map_err(|e| {
            IndexError::BomRootUnreadable {
                path: root.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn warn_issue(&mut self, issue: &NewIssue<'_>) -> Result<()> {
        self.store
            .log_issue(self.stats.run_id, Severity::Warning, issue)?;
        self.stats.warnings_count += 1;
        Ok(())
    }

    fn error_issue(&mut self, issue: &NewIssue<'_>) -> Result<()> {
        self.store
            .log_issue(self.stats.run_id, Severity::Error, issue)?;
        self.stats.errors_count += 1;
        Ok(())
    }

    // =====================================================================
    // BOM files
    // =====================================================================

    /// BOM files under the root, one per article number (last path wins)
    fn discover_boms(&mut self, bom_root: &Path) -> Result<Vec<PathBuf>> {
        let mut by_article: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        for entry in WalkDir::new(bom_root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(IndexError::BomRootUnreadable {
                        path: bom_root.to_path_buf(),
                        message: e.to_string(),
                    }
                    .into());
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_string_lossy().to_string());
                    let message = format!("Cannot read path: {}", e);
                    self.warn_issue(&NewIssue {
                        file_path: path.as_deref(),
                        message: &message,
                        ..Default::default()
                    })?;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_bom_file(entry.path()) {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let (article_number, _) = extract_article_from_filename(&filename);
            by_article
                .entry(article_number.to_uppercase())
                .or_default()
                .push(entry.into_path());
        }

        let mut files = Vec::with_capacity(by_article.len());
        for (article_number, mut paths) in by_article {
            self.stats.files_scanned += paths.len() as i64;
            let Some(winner) = paths.pop() else {
                continue;
            };
            for loser in &paths {
                let path = loser.to_string_lossy().to_string();
                let message = format!(
                    "Article {} is also defined by {}; this file is ignored",
                    article_number,
                    winner.display()
                );
                warn!(article = %article_number, file = %path, "duplicate article BOM");
                self.warn_issue(&NewIssue {
                    file_path: Some(&path),
                    message: &message,
                    ..Default::default()
                })?;
            }
            files.push(winner);
        }
        files.sort();
        Ok(files)
    }

    fn index_boms(&mut self, files: Vec<PathBuf>) -> Result<()> {
        let known = self.store.article_sources();

        for path in files {
            let file_label = path.to_string_lossy().to_string();
            let state = match file_state(&path) {
                Ok(state) => state,
                Err(e) => {
                    let message = format!("Cannot stat BOM file: {}", e);
                    self.error_issue(&NewIssue {
                        file_path: Some(&file_label),
                        message: &message,
                        ..Default::default()
                    })?;
                    continue;
                }
            };

            if known.get(&state.path) == Some(&state) {
                debug!(file = %file_label, "BOM unchanged");
                self.stats.boms_unchanged += 1;
                continue;
            }

            let parsed = match parse_bom_file(&path, self.config.header_scan_rows) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(file = %file_label, error = %e, "BOM parse failed");
                    let message = format!("Failed to parse BOM: {}", e);
                    self.error_issue(&NewIssue {
                        file_path: Some(&file_label),
                        message: &message,
                        ..Default::default()
                    })?;
                    continue;
                }
            };

            if parsed.lines.is_empty() {
                debug!(file = %file_label, "no header row with a part number column");
            }

            let outcome = self
                .store
                .replace_article(self.stats.run_id, &parsed, &state)?;
            debug!(
                file = %file_label,
                article = %parsed.article_number,
                lines = outcome.lines_inserted,
                skipped = outcome.rows_skipped,
                "BOM indexed"
            );
            self.stats.boms_parsed += 1;
            self.stats.lines_imported += outcome.lines_inserted;
            self.stats.warnings_count += outcome.rows_skipped;
        }
        Ok(())
    }

    /// Drop articles whose BOM file inside the root no longer exists
    fn prune_articles(&mut self, bom_root: &Path) -> Result<()> {
        let mut removed = 0;
        for article in self.store.all_articles() {
            let Some(source) = article.source_bom_path.as_deref() else {
                continue;
            };
            let source = Path::new(source);
            if source.starts_with(bom_root) && !source.exists() {
                debug!(article = %article.article_number, "pruning article");
                self.store.delete_article(article.id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "pruned articles with missing BOM files");
        }
        self.stats.articles_removed = removed;
        Ok(())
    }

    // =====================================================================
    // Documents
    // =====================================================================

    /// Scan document folders, returning the casefolded paths seen
    fn index_documents(&mut self, roots: &[PathBuf], force_relink: bool) -> Result<HashSet<String>> {
        let catalog = PartCatalog::load(self.store);
        let known: HashMap<String, Document> = self
            .store
            .all_documents()
            .into_iter()
            .map(|doc| (doc.path.clone(), doc))
            .collect();
        let mut seen = HashSet::new();

        let store = self.store;
        store.transaction(|store| {
            for root in roots {
                for entry in WalkDir::new(root).sort_by_file_name() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            let path = e.path().map(|p| p.to_string_lossy().to_string());
                            let message = format!("Cannot read path: {}", e);
                            self.warn_issue(&NewIssue {
                                file_path: path.as_deref(),
                                message: &message,
                                ..Default::default()
                            })?;
                            continue;
                        }
                    };
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(state) = file_state(entry.path()) else {
                        continue;
                    };
                    self.stats.documents_scanned += 1;
                    seen.insert(state.path.to_lowercase());

                    if !force_relink && is_unchanged(known.get(&state.path), &state) {
                        continue;
                    }

                    let filename = entry.file_name().to_string_lossy().to_string();
                    let outcome = match_document(&catalog, &filename, &self.config.matching);
                    debug!(file = %filename, reason = outcome.reason.as_str(), "document matched");
                    if outcome.is_linked() {
                        self.stats.documents_linked += 1;
                    }
                    store.upsert_document(
                        self.stats.run_id,
                        &DocumentRecord {
                            extension: extension_of(entry.path()),
                            filename,
                            file: state,
                            link: outcome.link,
                            part_revision: outcome.part_revision,
                            link_reason: Some(outcome.reason),
                        },
                    )?;
                    self.stats.documents_updated += 1;
                }
            }
            Ok(())
        })?;

        Ok(seen)
    }

    /// Drop documents that are gone, or that sit in a scanned folder but were
    /// not seen this run
    fn prune_documents(&mut self, roots: &[PathBuf], seen: &HashSet<String>) -> Result<()> {
        let stale: Vec<i64> = self
            .store
            .all_documents()
            .into_iter()
            .filter(|doc| {
                let path = Path::new(&doc.path);
                if !path.exists() {
                    return true;
                }
                let managed = roots.iter().any(|root| path.starts_with(root));
                managed && !seen.contains(&doc.path.to_lowercase())
            })
            .map(|doc| doc.id)
            .collect();

        let removed = self.store.delete_documents(&stale)? as i64;
        if removed > 0 {
            info!(removed, "pruned missing documents");
        }
        self.stats.documents_removed = removed;
        Ok(())
    }
}

fn is_unchanged(existing: Option<&Document>, state: &FileState) -> bool {
    existing.is_some_and(|doc| {
        doc.size_bytes == Some(state.size_bytes)
            && doc.modified_at.as_deref() == Some(state.modified_at.as_str())
    })
}

/// Lowercase extension with its dot, empty when there is none
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn existing_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter(|root| root.is_dir())
        .filter_map(|root| fs::canonicalize(root).ok())
        .collect()
}
