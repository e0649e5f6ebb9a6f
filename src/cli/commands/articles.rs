//! `bomdex articles` command - list indexed articles

use miette::Result;

use crate::cli::helpers::{load_config, open_store, opt_str};
use crate::cli::table::{CellValue, ColumnDef, TableConfig, TableFormatter, TableRow};
use crate::cli::GlobalOpts;
use crate::core::store::ArticleQuery;

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 8),
    ColumnDef::new("article_number", "ARTICLE", 16),
    ColumnDef::new("title", "TITLE", 48),
    ColumnDef::new("lines", "LINES", 7),
];

#[derive(clap::Args, Debug)]
pub struct ArticlesArgs {
    /// Text to search in article numbers and titles
    pub search: Option<String>,

    /// Only match article numbers and titles, not the BOM lines
    #[arg(long)]
    pub no_children: bool,

    /// Hide articles used as a sub-assembly elsewhere
    #[arg(long)]
    pub top_level: bool,

    /// Maximum number of articles
    #[arg(long, short = 'n', default_value = "500")]
    pub limit: usize,
}

pub fn run(args: ArticlesArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    let query = ArticleQuery {
        text: args.search.unwrap_or_default(),
        limit: args.limit,
        search_in_children: !args.no_children,
        top_level_only: args.top_level,
    };
    let rows = store.list_articles(&query).into_iter().map(|a| {
        TableRow::new()
            .cell("id", CellValue::Id(a.id))
            .cell("article_number", CellValue::Key(a.article_number))
            .cell("title", CellValue::Text(opt_str(a.title.as_deref())))
            .cell("lines", CellValue::Number(a.bom_line_count.to_string()))
    });

    let formatter = TableFormatter::new(COLUMNS, "article");
    let formatter = if global.quiet {
        formatter.with_config(TableConfig::for_pipe())
    } else {
        formatter
    };
    formatter.output(rows, global.format)
}
