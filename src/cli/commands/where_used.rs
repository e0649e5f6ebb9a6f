//! `bomdex where-used` command - find the articles using a part number

use console::style;
use miette::Result;

use crate::cli::helpers::{load_config, open_store, opt_qty, opt_str};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::PartUsage;

pub(crate) const USAGE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("article_id", "ID", 8),
    ColumnDef::new("article_number", "ARTICLE", 16),
    ColumnDef::new("title", "TITLE", 36),
    ColumnDef::new("item_no", "ITEM", 10),
    ColumnDef::new("qty", "QTY", 8),
    ColumnDef::new("revision", "REV", 5),
    ColumnDef::new("material", "MATERIAL", 16),
];

#[derive(clap::Args, Debug)]
pub struct WhereUsedArgs {
    /// Part number to search for
    pub part_number: String,
}

pub fn run(args: WhereUsedArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    let usages = store.articles_using_part_number(&args.part_number);
    if usages.is_empty() && global.format == OutputFormat::Auto {
        println!("{}", style("No references found.").yellow());
        return Ok(());
    }

    TableFormatter::new(USAGE_COLUMNS, "usage").output(usages.iter().map(usage_row), global.format)
}

pub(crate) fn usage_row(usage: &PartUsage) -> TableRow {
    TableRow::new()
        .cell("article_id", CellValue::Id(usage.article_id))
        .cell("article_number", CellValue::Key(usage.article_number.clone()))
        .cell("title", CellValue::Text(opt_str(usage.title.as_deref())))
        .cell("item_no", CellValue::Text(opt_str(usage.item_no.as_deref())))
        .cell("qty", CellValue::Number(opt_qty(usage.qty)))
        .cell("revision", CellValue::Text(opt_str(usage.revision.as_deref())))
        .cell("material", CellValue::Text(opt_str(usage.material.as_deref())))
}
