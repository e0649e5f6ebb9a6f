//! bomdex: BOM index and reconciliation engine
//!
//! Turns a folder tree of BOM spreadsheets and loosely named documents into a
//! normalized SQLite graph of Article -> BOM Line -> Part, with documents
//! attached to parts, and keeps it incrementally up to date.

pub mod cli;
pub mod core;
