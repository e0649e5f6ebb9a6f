//! Order explosion
//!
//! Flattens a node of a [`BomTree`] into terminal parts with multiplied
//! quantities. Sub-assembly lines recurse into the referenced article's own
//! current lines. Structural problems never abort an explosion; they are
//! collected as warnings next to whatever could be resolved.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::core::graph::{BomSource, BomTree, NodeKind};
use crate::core::store::{BomLine, BomStore};

/// Which part of the selected node ends up in the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplodeMode {
    /// Only the selected line itself
    SelectedOnly,
    /// Terminal descendants of the selected node
    ChildrenOnly,
    /// The selected line and every line below it
    FullSubtree,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExplodeWarning {
    MaxDepth { limit: usize },
    Cycle { part_number: String },
    MissingSubassembly { part_number: String },
    NoLines { article_id: i64 },
}

impl fmt::Display for ExplodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplodeWarning::MaxDepth { limit } => {
                write!(f, "maximum depth of {} reached, branch not expanded", limit)
            }
            ExplodeWarning::Cycle { part_number } => {
                write!(f, "cycle detected at sub-assembly {}", part_number)
            }
            ExplodeWarning::MissingSubassembly { part_number } => {
                write!(f, "sub-assembly {} is no longer indexed", part_number)
            }
            ExplodeWarning::NoLines { article_id } => {
                write!(f, "sub-assembly article {} has no BOM lines", article_id)
            }
        }
    }
}

/// One accumulated order entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub key: String,
    /// Article owning the BOM line
    pub article_id: i64,
    pub item_no: String,
    pub part_id: i64,
    pub part_number: String,
    /// Uppercase, empty when the line has none
    pub revision: String,
    pub description: String,
    pub material: String,
    pub finish: String,
    pub qty_total: f64,
}

/// Flat, quantity-accumulated order list plus the warnings raised building it
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderList {
    lines: Vec<OrderLine>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    warnings: Vec<ExplodeWarning>,
}

impl OrderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `qty` of a line, merging with an existing entry of the same key
    pub fn add(&mut self, article_id: i64, line: &BomLine, qty: f64) -> bool {
        let part_number = line.part_number.trim();
        if part_number.is_empty() {
            return false;
        }
        let item_no = line.item_no.as_deref().unwrap_or("").trim().to_string();
        let revision = line
            .revision
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_uppercase();
        let key = format!("{}|{}|{}|{}", article_id, item_no, part_number, revision);

        match self.index.get(&key) {
            Some(&idx) => self.lines[idx].qty_total += qty,
            None => {
                self.index.insert(key.clone(), self.lines.len());
                self.lines.push(OrderLine {
                    key,
                    article_id,
                    item_no,
                    part_id: line.part_id,
                    part_number: part_number.to_string(),
                    revision,
                    description: line.description.clone().unwrap_or_default(),
                    material: line.material.clone().unwrap_or_default(),
                    finish: line.finish.clone().unwrap_or_default(),
                    qty_total: qty,
                });
            }
        }
        true
    }

    fn warn(&mut self, warning: ExplodeWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Entries in insertion order
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn warnings(&self) -> &[ExplodeWarning] {
        &self.warnings
    }

    pub fn get(&self, key: &str) -> Option<&OrderLine> {
        self.index.get(key).map(|idx| &self.lines[*idx])
    }

    /// Remove one entry by key
    pub fn remove(&mut self, key: &str) -> Option<OrderLine> {
        let idx = self.index.remove(key)?;
        let removed = self.lines.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries sorted by part number, then revision
    pub fn sorted_by_part(&self) -> Vec<&OrderLine> {
        let mut lines: Vec<&OrderLine> = self.lines.iter().collect();
        lines.sort_by(|a, b| {
            a.part_number
                .cmp(&b.part_number)
                .then_with(|| a.revision.cmp(&b.revision))
        });
        lines
    }
}

/// Walks trees and sub-assemblies into an [`OrderList`]
pub struct Exploder<'a, S: BomSource> {
    source: &'a S,
    max_depth: usize,
}

impl<'a, S: BomSource> Exploder<'a, S> {
    pub fn new(source: &'a S, max_depth: usize) -> Self {
        Self { source, max_depth }
    }

    /// Explode one node of `tree` into a fresh order list
    pub fn explode(&self, tree: &BomTree, node: usize, mode: ExplodeMode, qty_factor: f64) -> OrderList {
        let mut order = OrderList::new();
        self.explode_into(&mut order, tree, node, mode, qty_factor);
        order
    }

    /// Explode one node of `tree`, accumulating into `order`
    pub fn explode_into(
        &self,
        order: &mut OrderList,
        tree: &BomTree,
        node: usize,
        mode: ExplodeMode,
        qty_factor: f64,
    ) {
        let mut path = vec![tree.article_id];
        let selected = tree.node(node);

        if selected.kind == NodeKind::Article {
            match mode {
                ExplodeMode::SelectedOnly => {}
                ExplodeMode::ChildrenOnly => {
                    for &child in &selected.children {
                        self.children(order, tree, child, qty_factor, &mut path, 0, true);
                    }
                }
                ExplodeMode::FullSubtree => {
                    for &child in &selected.children {
                        self.full(order, tree, child, qty_factor, &mut path, 0);
                    }
                }
            }
            return;
        }

        match mode {
            ExplodeMode::SelectedOnly => {
                if let Some(line) = &selected.line {
                    order.add(tree.article_id, line, selected.qty() * qty_factor);
                }
            }
            ExplodeMode::ChildrenOnly => {
                self.children(order, tree, node, qty_factor, &mut path, 0, false)
            }
            ExplodeMode::FullSubtree => self.full(order, tree, node, qty_factor, &mut path, 0),
        }
    }

    /// Terminal lines below a node. Nodes with tree children only multiply.
    #[allow(clippy::too_many_arguments)]
    fn children(
        &self,
        order: &mut OrderList,
        tree: &BomTree,
        idx: usize,
        factor: f64,
        path: &mut Vec<i64>,
        depth: usize,
        include_self: bool,
    ) {
        if depth > self.max_depth {
            order.warn(ExplodeWarning::MaxDepth {
                limit: self.max_depth,
            });
            return;
        }
        let node = tree.node(idx);
        let qty = node.qty();

        if node.has_children() {
            for &child in &node.children {
                self.children(order, tree, child, factor * qty, path, depth + 1, true);
            }
            return;
        }

        let Some(line) = &node.line else {
            return;
        };
        if let NodeKind::AssemblyRef { .. } = node.kind {
            self.subassembly(order, line, factor * qty, path, depth + 1);
            return;
        }
        if include_self {
            order.add(tree.article_id, line, qty * factor);
        }
    }

    /// Every line below and including a node
    fn full(
        &self,
        order: &mut OrderList,
        tree: &BomTree,
        idx: usize,
        factor: f64,
        path: &mut Vec<i64>,
        depth: usize,
    ) {
        if depth > self.max_depth {
            order.warn(ExplodeWarning::MaxDepth {
                limit: self.max_depth,
            });
            return;
        }
        let node = tree.node(idx);
        let qty = node.qty();
        let Some(line) = &node.line else {
            return;
        };
        order.add(tree.article_id, line, qty * factor);

        if node.has_children() {
            for &child in &node.children {
                self.full(order, tree, child, factor * qty, path, depth + 1);
            }
            return;
        }
        if let NodeKind::AssemblyRef { .. } = node.kind {
            self.subassembly(order, line, factor * qty, path, depth + 1);
        }
    }

    /// Terminal lines of the article a sub-assembly line points at
    fn subassembly(
        &self,
        order: &mut OrderList,
        line: &BomLine,
        factor: f64,
        path: &mut Vec<i64>,
        depth: usize,
    ) {
        if depth > self.max_depth {
            order.warn(ExplodeWarning::MaxDepth {
                limit: self.max_depth,
            });
            return;
        }
        let Some(article_id) = self.source.resolve_article(&line.part_number) else {
            order.warn(ExplodeWarning::MissingSubassembly {
                part_number: line.part_number.clone(),
            });
            return;
        };
        if path.contains(&article_id) {
            order.warn(ExplodeWarning::Cycle {
                part_number: line.part_number.clone(),
            });
            return;
        }

        let sub_tree = BomTree::load(self.source, article_id);
        if sub_tree.is_empty() {
            order.warn(ExplodeWarning::NoLines { article_id });
            return;
        }

        path.push(article_id);
        for &child in &sub_tree.root().children {
            self.children(order, &sub_tree, child, factor, path, depth, true);
        }
        path.pop();
    }
}

// =========================================================================
// Export
// =========================================================================

/// What an order export produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub bundle_dir: PathBuf,
    pub order_file: PathBuf,
    pub workbook_file: PathBuf,
    pub archive: PathBuf,
    pub lines_written: usize,
    pub documents_copied: usize,
}

const ORDER_HEADERS: [&str; 6] = ["Part NR", "Rev", "Description", "Qty", "Material", "Finish"];

/// Quantity as written to exports and tables ("6", "1.5")
pub fn format_qty(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{:.4}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Write an order bundle under `target_root`.
///
/// `BOMDEX_Order_<ts>/` holds `order_lines.csv`, `order_lines.xlsx` and
/// copies of each line's revision documents in `docs/`. The same tree is
/// packed into `BOMDEX_Order_<ts>.zip` next to it.
pub fn export_order(store: &BomStore, order: &OrderList, target_root: &Path) -> Result<ExportSummary> {
    if order.is_empty() {
        return Err(miette::miette!("order list is empty, nothing to export"));
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let bundle_name = format!("BOMDEX_Order_{}", timestamp);
    let bundle_dir = target_root.join(&bundle_name);
    let docs_dir = bundle_dir.join("docs");
    fs::create_dir_all(&docs_dir).into_diagnostic()?;

    let sorted = order.sorted_by_part();
    let order_file = bundle_dir.join("order_lines.csv");
    write_order_csv(&order_file, &sorted)?;
    let workbook_file = bundle_dir.join("order_lines.xlsx");
    write_order_workbook(&workbook_file, &sorted)?;

    let mut used_names: HashMap<String, usize> = HashMap::new();
    let mut documents_copied = 0;
    for line in order.lines() {
        let revision = (!line.revision.is_empty()).then_some(line.revision.as_str());
        for doc in store.documents_for_part_revision(line.part_id, revision) {
            let src = Path::new(&doc.path);
            if !src.is_file() {
                continue;
            }
            let out_name = unique_name(&mut used_names, src);
            fs::copy(src, docs_dir.join(out_name)).into_diagnostic()?;
            documents_copied += 1;
        }
    }

    let archive = target_root.join(format!("{}.zip", bundle_name));
    zip_dir(&bundle_dir, &archive)?;

    Ok(ExportSummary {
        bundle_dir,
        order_file,
        workbook_file,
        archive,
        lines_written: sorted.len(),
        documents_copied,
    })
}

fn write_order_csv(path: &Path, lines: &[&OrderLine]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).into_diagnostic()?;
    writer.write_record(ORDER_HEADERS).into_diagnostic()?;
    for line in lines {
        writer
            .write_record([
                line.part_number.as_str(),
                line.revision.as_str(),
                line.description.as_str(),
                format_qty(line.qty_total).as_str(),
                line.material.as_str(),
                line.finish.as_str(),
            ])
            .into_diagnostic()?;
    }
    writer.flush().into_diagnostic()
}

fn write_order_workbook(path: &Path, lines: &[&OrderLine]) -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet("Order")
        .map_err(|e| miette::miette!("cannot create order sheet: {}", e))?;

    for (col, header) in ORDER_HEADERS.iter().enumerate() {
        sheet.get_cell_mut((col as u32 + 1, 1)).set_value_string(*header);
    }
    for (idx, line) in lines.iter().enumerate() {
        let row = idx as u32 + 2;
        sheet.get_cell_mut((1, row)).set_value_string(line.part_number.as_str());
        sheet.get_cell_mut((2, row)).set_value_string(line.revision.as_str());
        sheet.get_cell_mut((3, row)).set_value_string(line.description.as_str());
        sheet.get_cell_mut((4, row)).set_value_number(line.qty_total);
        sheet.get_cell_mut((5, row)).set_value_string(line.material.as_str());
        sheet.get_cell_mut((6, row)).set_value_string(line.finish.as_str());
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| miette::miette!("cannot write {}: {}", path.display(), e))
}

/// Pack every file below `dir` into a deflated archive, paths relative to `dir`
fn zip_dir(dir: &Path, archive: &Path) -> Result<()> {
    let file = fs::File::create(archive).into_diagnostic()?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.into_diagnostic()?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).into_diagnostic()?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options).into_diagnostic()?;
        let mut src = fs::File::open(entry.path()).into_diagnostic()?;
        io::copy(&mut src, &mut zip).into_diagnostic()?;
    }
    zip.finish().into_diagnostic()?;
    Ok(())
}

/// "a.pdf", then "a_2.pdf", "a_3.pdf" for later files of the same name
fn unique_name(used: &mut HashMap<String, usize>, src: &Path) -> String {
    let base = src
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        return base;
    }
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match src.extension() {
        Some(ext) => format!("{}_{}.{}", stem, count, ext.to_string_lossy()),
        None => format!("{}_{}", stem, count),
    }
}
