//! Core module - indexing engine and queries

pub mod config;
pub mod explode;
pub mod graph;
pub mod indexer;
pub mod mapping;
pub mod matching;
pub mod parser;
pub mod store;
pub mod writeback;

pub use config::{ConfigLayer, IndexConfig, MatchingConfig};
pub use explode::{ExplodeMode, ExplodeWarning, Exploder, OrderLine, OrderList};
pub use graph::{ArticleRefIndex, BomSnapshot, BomSource, BomTree, NodeKind};
pub use indexer::{run_index, IndexError, IndexStats};
pub use matching::{match_document, MatchOutcome, PartCatalog};
pub use parser::{parse_bom_file, ParseError, ParsedBom, ParsedLine};
pub use store::{BomStore, StoreError};
pub use writeback::{apply_line_edits, apply_revision_suggestions, LineEdit, WriteBackError, WriteBackSummary};
