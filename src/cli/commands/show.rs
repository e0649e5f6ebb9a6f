//! `bomdex show` command - an article's BOM as a tree or line table

use console::style;
use miette::Result;
use std::collections::HashSet;

use crate::cli::helpers::{load_config, open_store, opt_qty, opt_str, resolve_article};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::graph::{find_reference_cycle, BomSnapshot, BomTree, NodeKind};
use crate::core::store::{BomStore, LinkTarget};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("line_id", "LINE", 8),
    ColumnDef::new("item_no", "ITEM", 10),
    ColumnDef::new("part_number", "PART", 18),
    ColumnDef::new("description", "DESCRIPTION", 40),
    ColumnDef::new("qty", "QTY", 8),
    ColumnDef::new("revision", "REV", 5),
    ColumnDef::new("material", "MATERIAL", 16),
    ColumnDef::new("finish", "FINISH", 14),
    ColumnDef::new("subassembly", "SUBASSY", 10),
];

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Article number (or id)
    pub article: String,

    /// Print the lines as a table instead of a tree
    #[arg(long)]
    pub flat: bool,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;
    let article = resolve_article(&store, &args.article)?;

    let snapshot = BomSnapshot::load(&store);
    let tree = BomTree::load(&snapshot, article.id);

    if global.format != OutputFormat::Auto || args.flat {
        let rows = tree.walk().into_iter().filter_map(|idx| {
            let node = tree.node(idx);
            let line = node.line.as_ref()?;
            let subassembly = match node.kind {
                NodeKind::AssemblyRef { article_id } => article_number(&store, article_id),
                _ => String::new(),
            };
            Some(
                TableRow::new()
                    .cell("line_id", CellValue::Id(line.id))
                    .cell("item_no", CellValue::Text(opt_str(line.item_no.as_deref())))
                    .cell("part_number", CellValue::Key(line.part_number.clone()))
                    .cell("description", CellValue::Text(opt_str(line.description.as_deref())))
                    .cell("qty", CellValue::Number(opt_qty(line.qty)))
                    .cell("revision", CellValue::Text(opt_str(line.revision.as_deref())))
                    .cell("material", CellValue::Text(opt_str(line.material.as_deref())))
                    .cell("finish", CellValue::Text(opt_str(line.finish.as_deref())))
                    .cell("subassembly", CellValue::Key(subassembly)),
            )
        });
        return TableFormatter::new(COLUMNS, "line").output(rows, global.format);
    }

    let cycle: HashSet<i64> = find_reference_cycle(&snapshot, article.id)
        .unwrap_or_default()
        .into_iter()
        .collect();

    println!(
        "{} {}",
        style(&article.article_number).cyan().bold(),
        style(opt_str(article.title.as_deref())).bold()
    );
    if !global.quiet {
        if let Some(path) = &article.source_bom_path {
            println!("{}: {}", style("Source").dim(), path);
        }
        let parents: Vec<String> = store
            .parent_articles(article.id)
            .into_iter()
            .map(|p| p.article_number)
            .collect();
        if !parents.is_empty() {
            println!("{}: {}", style("Used in").dim(), parents.join(", "));
        }
        let docs = store.documents_for(LinkTarget::Article, article.id);
        if !docs.is_empty() {
            println!("{}: {}", style("Documents").dim(), docs.len());
        }
    }
    println!();

    if tree.is_empty() {
        println!("{}", style("No BOM lines.").yellow());
        return Ok(());
    }

    let mut output = String::new();
    render_children(&store, &tree, BomTree::ROOT, "", &cycle, &mut output);
    print!("{}", output);

    if !cycle.is_empty() && !global.quiet {
        println!();
        println!(
            "{} sub-assembly cycle: {}",
            style("!").yellow(),
            cycle_path(&store, &snapshot, article.id)
        );
    }
    Ok(())
}

fn render_children(
    store: &BomStore,
    tree: &BomTree,
    idx: usize,
    prefix: &str,
    cycle: &HashSet<i64>,
    output: &mut String,
) {
    let children = &tree.node(idx).children;
    for (i, &child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let branch = if is_last { "└─ " } else { "├─ " };
        let node = tree.node(child);
        let Some(line) = &node.line else {
            continue;
        };

        let mut text = format!(
            "{} {}",
            style(opt_str(line.item_no.as_deref())).dim(),
            style(&line.part_number).cyan()
        );
        if let Some(description) = line.description.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!(" {}", description));
        }
        text.push_str(&format!(" (qty: {})", opt_qty(line.qty.or(Some(1.0)))));
        if let Some(rev) = line.revision.as_deref().filter(|r| !r.trim().is_empty()) {
            text.push_str(&format!(" rev {}", rev));
        }
        if let NodeKind::AssemblyRef { article_id } = node.kind {
            text.push_str(&format!(
                " {}",
                style(format!("[sub-assembly {}]", article_number(store, article_id))).green()
            ));
            if cycle.contains(&article_id) {
                text.push_str(&format!(" {}", style("[CYCLE DETECTED]").red()));
            }
        }

        output.push_str(&format!("{}{}{}\n", prefix, branch, text));
        let next_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
        render_children(store, tree, child, &next_prefix, cycle, output);
    }
}

fn article_number(store: &BomStore, article_id: i64) -> String {
    store
        .article(article_id)
        .map(|a| a.article_number)
        .unwrap_or_else(|| article_id.to_string())
}

fn cycle_path(store: &BomStore, snapshot: &BomSnapshot, start: i64) -> String {
    find_reference_cycle(snapshot, start)
        .unwrap_or_default()
        .into_iter()
        .map(|id| article_number(store, id))
        .collect::<Vec<_>>()
        .join(" -> ")
}
