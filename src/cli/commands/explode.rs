//! `bomdex explode` command - flatten an article or BOM line into an order list

use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{load_config, open_store, resolve_article};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::explode::{export_order, format_qty, ExplodeMode, Exploder};
use crate::core::graph::{BomSnapshot, BomTree};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("part_number", "PART", 18),
    ColumnDef::new("revision", "REV", 5),
    ColumnDef::new("description", "DESCRIPTION", 40),
    ColumnDef::new("qty", "QTY", 8),
    ColumnDef::new("material", "MATERIAL", 16),
    ColumnDef::new("finish", "FINISH", 14),
    ColumnDef::new("item_no", "ITEM", 10),
];

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Only the selected line
    Selected,
    /// Terminal parts below the selection
    #[default]
    Children,
    /// The selection and everything below it
    Full,
}

impl From<ModeArg> for ExplodeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Selected => ExplodeMode::SelectedOnly,
            ModeArg::Children => ExplodeMode::ChildrenOnly,
            ModeArg::Full => ExplodeMode::FullSubtree,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ExplodeArgs {
    /// Article number (or id)
    pub article: String,

    /// Start from this item number instead of the whole article
    #[arg(long, short = 'i', conflicts_with = "line")]
    pub item: Option<String>,

    /// Start from this BOM line id
    #[arg(long)]
    pub line: Option<i64>,

    /// Which part of the selection to include
    #[arg(long, short = 'm', value_enum, default_value = "children")]
    pub mode: ModeArg,

    /// Quantity multiplier
    #[arg(long, default_value = "1")]
    pub qty: f64,

    /// Write an order bundle (CSV, XLSX, documents and a ZIP of them) into this directory
    #[arg(long)]
    pub export: Option<PathBuf>,
}

pub fn run(args: ExplodeArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;
    let article = resolve_article(&store, &args.article)?;

    let snapshot = BomSnapshot::load(&store);
    let tree = BomTree::load(&snapshot, article.id);

    let node = match (&args.item, args.line) {
        (Some(item), _) => tree.find_item(item).ok_or_else(|| {
            miette::miette!("item '{}' not found in article {}", item, article.article_number)
        })?,
        (None, Some(line_id)) => tree.find_line(line_id).ok_or_else(|| {
            miette::miette!("line {} not found in article {}", line_id, article.article_number)
        })?,
        (None, None) => BomTree::ROOT,
    };

    let order = Exploder::new(&snapshot, config.max_explosion_depth).explode(
        &tree,
        node,
        args.mode.into(),
        args.qty,
    );

    for warning in order.warnings() {
        eprintln!("{} {}", style("warning:").yellow(), warning);
    }

    if let Some(target) = &args.export {
        let summary = export_order(&store, &order, target)?;
        if global.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        } else if !global.quiet {
            println!(
                "{} Wrote {} line(s) and {} document(s) to {}",
                style("✓").green(),
                summary.lines_written,
                summary.documents_copied,
                style(summary.bundle_dir.display()).cyan()
            );
            println!("  Archive: {}", style(summary.archive.display()).cyan());
        }
        return Ok(());
    }

    if global.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&order).into_diagnostic()?);
        return Ok(());
    }

    let rows = order.sorted_by_part().into_iter().map(|line| {
        TableRow::new()
            .cell("part_number", CellValue::Key(line.part_number.clone()))
            .cell("revision", CellValue::Text(line.revision.clone()))
            .cell("description", CellValue::Text(line.description.clone()))
            .cell("qty", CellValue::Number(format_qty(line.qty_total)))
            .cell("material", CellValue::Text(line.material.clone()))
            .cell("finish", CellValue::Text(line.finish.clone()))
            .cell("item_no", CellValue::Text(line.item_no.clone()))
    });
    TableFormatter::new(COLUMNS, "order line").output(rows, global.format)
}
