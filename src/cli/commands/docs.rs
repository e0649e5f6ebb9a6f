//! `bomdex docs` command - documents linked to an article or part

use miette::Result;

use crate::cli::helpers::{load_config, open_store, opt_str, resolve_article};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::GlobalOpts;
use crate::core::store::{Document, LinkTarget};

pub(crate) const DOC_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 8),
    ColumnDef::new("filename", "FILENAME", 40),
    ColumnDef::new("doc_type", "TYPE", 6),
    ColumnDef::new("revision", "REV", 5),
    ColumnDef::new("reason", "REASON", 30),
    ColumnDef::new("path", "PATH", 60),
];

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["article", "part"])))]
pub struct DocsArgs {
    /// Article number (or id)
    #[arg(long, short = 'a')]
    pub article: Option<String>,

    /// Part number
    #[arg(long, short = 'p')]
    pub part: Option<String>,

    /// Only documents for this part revision (falls back to all when none match)
    #[arg(long, short = 'r', requires = "part")]
    pub rev: Option<String>,
}

pub fn run(args: DocsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    let docs = if let Some(key) = &args.article {
        let article = resolve_article(&store, key)?;
        store.documents_for(LinkTarget::Article, article.id)
    } else if let Some(part_number) = &args.part {
        let part = store
            .part_by_number(part_number)
            .ok_or_else(|| miette::miette!("part '{}' not found", part_number))?;
        store.documents_for_part_revision(part.id, args.rev.as_deref())
    } else {
        Vec::new()
    };

    TableFormatter::new(DOC_COLUMNS, "document").output(docs.iter().map(doc_row), global.format)
}

pub(crate) fn doc_row(doc: &Document) -> TableRow {
    TableRow::new()
        .cell("id", CellValue::Id(doc.id))
        .cell("filename", CellValue::Text(doc.filename.clone()))
        .cell(
            "doc_type",
            CellValue::Text(doc.doc_type.map(|t| t.as_str().to_string()).unwrap_or_default()),
        )
        .cell("revision", CellValue::Text(opt_str(doc.part_revision.as_deref())))
        .cell(
            "reason",
            CellValue::Reason(doc.link_reason.map(|r| r.as_str().to_string()).unwrap_or_default()),
        )
        .cell("path", CellValue::Text(doc.path.clone()))
}
