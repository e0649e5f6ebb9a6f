//! `bomdex suggest-revisions` command - revision hints from document names

use miette::Result;

use crate::cli::helpers::{load_config, open_store, opt_str, resolve_article};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::GlobalOpts;
use crate::core::matching::suggest_revisions;
use crate::core::writeback::apply_revision_suggestions;

use super::edit_line::print_summary;

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("line_id", "LINE", 8),
    ColumnDef::new("item_no", "ITEM", 10),
    ColumnDef::new("part_number", "PART", 18),
    ColumnDef::new("suggested_revision", "SUGGESTED", 10),
];

#[derive(clap::Args, Debug)]
pub struct SuggestRevisionsArgs {
    /// Article number (or id)
    pub article: String,

    /// Enable developer mode for this invocation
    #[arg(long)]
    pub developer: bool,

    /// Write the suggested revisions into the BOM files and re-index
    #[arg(long)]
    pub apply: bool,
}

pub fn run(args: SuggestRevisionsArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = load_config(global);
    if args.developer {
        config.developer_mode = true;
    }
    let store = open_store(&config)?;
    let article = resolve_article(&store, &args.article)?;

    if args.apply {
        let summary = apply_revision_suggestions(&store, article.id, &config)?;
        return print_summary(&summary, global);
    }

    let rows = suggest_revisions(&store, article.id, &config)?
        .into_iter()
        .map(|s| {
            TableRow::new()
                .cell("line_id", CellValue::Id(s.line_id))
                .cell("item_no", CellValue::Text(opt_str(s.item_no.as_deref())))
                .cell("part_number", CellValue::Key(s.part_number))
                .cell("suggested_revision", CellValue::Text(s.suggested_revision))
        });
    TableFormatter::new(COLUMNS, "suggestion").output(rows, global.format)
}
