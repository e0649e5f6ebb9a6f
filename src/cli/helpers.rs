//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::Result;

use crate::cli::GlobalOpts;
use crate::core::config::{ConfigLayer, IndexConfig};
use crate::core::explode::format_qty;
use crate::core::store::{Article, BomStore};

/// Effective configuration with the global flags applied on top
pub fn load_config(global: &GlobalOpts) -> IndexConfig {
    IndexConfig::load(ConfigLayer {
        data_root: global.data_root.clone(),
        db_path: global.db.clone(),
        ..Default::default()
    })
}

/// Open the configured index, creating it when missing
pub fn open_store(config: &IndexConfig) -> Result<BomStore> {
    BomStore::open(&config.db_path)
}

/// Find an article by number, falling back to a numeric id
pub fn resolve_article(store: &BomStore, key: &str) -> Result<Article> {
    store
        .article_by_number(key)
        .or_else(|| key.trim().parse::<i64>().ok().and_then(|id| store.article(id)))
        .ok_or_else(|| {
            miette::miette!(
                help = "list indexed articles with `bomdex articles`",
                "article '{}' not found",
                key
            )
        })
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Optional text for table cells
pub fn opt_str(value: Option<&str>) -> String {
    value.unwrap_or("").to_string()
}

/// Optional quantity for table cells
pub fn opt_qty(value: Option<f64>) -> String {
    value.map(format_qty).unwrap_or_default()
}
