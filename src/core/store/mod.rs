//! SQLite-backed BOM index
//!
//! This module provides the persistent store that:
//! - Holds articles, parts, BOM lines and documents
//! - Records every indexing pass as an import run with its issues
//! - Answers the read-side queries used by the CLI
//!
//! Schema changes are additive only; an existing index file is migrated in
//! place, never rebuilt.

mod queries;
mod schema;
mod types;
mod writes;

pub use queries::ArticleQuery;
pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use miette::{Diagnostic, IntoDiagnostic, Result};
use rusqlite::Connection;
use thiserror::Error;

/// Store errors that callers may want to match on
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("invalid part type '{0}'")]
    #[diagnostic(
        code(bomdex::store::part_type),
        help("valid types: mechanical, fastener, packaging, label, documentation, service, other")
    )]
    InvalidPartType(String),

    #[error("part {0} not found")]
    #[diagnostic(code(bomdex::store::part_not_found))]
    PartNotFound(i64),
}

/// The BOM index backed by SQLite
pub struct BomStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl BomStore {
    /// Open or create the index at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).into_diagnostic()?;
            }
        }

        let conn = Connection::open(path).into_diagnostic()?;

        // WAL lets a reader query while an index run writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .into_diagnostic()?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a private in-memory index
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_diagnostic()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").into_diagnostic()?;
        let store = Self { conn, path: None };
        store.init_schema()?;
        Ok(store)
    }

    /// Location of the index file, if not in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Current time as stored in the index
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format a filesystem time the way the index stores it
pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read the change-detection stamp of a file
pub fn file_state(path: &Path) -> Result<FileState> {
    let metadata = fs::metadata(path).into_diagnostic()?;
    let modified = metadata.modified().into_diagnostic()?;
    Ok(FileState {
        path: path.to_string_lossy().to_string(),
        modified_at: format_system_time(modified),
        size_bytes: metadata.len() as i64,
    })
}
