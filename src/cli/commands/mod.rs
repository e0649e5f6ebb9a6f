//! CLI command implementations

pub mod articles;
pub mod completions;
pub mod docs;
pub mod edit_line;
pub mod explode;
pub mod index;
pub mod part;
pub mod runs;
pub mod show;
pub mod suggest;
pub mod unlinked;
pub mod where_used;
