//! BOM graph resolution
//!
//! Turns an article's flat line set into a tree keyed by dotted item numbers
//! and decides which lines point at another indexed article (sub-assemblies).
//! Nodes live in an arena indexed by position; articles are referenced by id,
//! so cycle checks only ever need a set of ids.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::store::{BomLine, BomStore};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").expect("valid regex"));

/// Article numbers a part number may refer to, most specific first:
/// the literal value, then each distinct run of 3+ digits (longest first),
/// each followed by its zero-stripped form.
///
/// "ART-0017004" -> ["ART-0017004", "0017004", "17004"]
pub fn article_number_candidates(part_number: &str) -> Vec<String> {
    let raw = part_number.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut candidates = vec![raw.to_string()];
    let mut runs: Vec<&str> = DIGIT_RUN.find_iter(raw).map(|m| m.as_str()).collect();
    runs.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    runs.dedup();

    for run in runs {
        if !candidates.iter().any(|c| c == run) {
            candidates.push(run.to_string());
        }
        let trimmed = run.trim_start_matches('0');
        if !trimmed.is_empty() && !candidates.iter().any(|c| c == trimmed) {
            candidates.push(trimmed.to_string());
        }
    }
    candidates
}

/// Article number -> id lookup used to spot sub-assembly references.
///
/// Built from the articles table; rebuild it after any article write.
#[derive(Debug, Clone, Default)]
pub struct ArticleRefIndex {
    by_number: HashMap<String, i64>,
}

impl ArticleRefIndex {
    pub fn new<I, S>(articles: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        Self {
            by_number: articles
                .into_iter()
                .map(|(number, id)| (number.as_ref().trim().to_uppercase(), id))
                .collect(),
        }
    }

    pub fn load(store: &BomStore) -> Self {
        Self::new(
            store
                .all_articles()
                .into_iter()
                .map(|a| (a.article_number, a.id)),
        )
    }

    /// First article matched by any candidate of `part_number`
    pub fn resolve(&self, part_number: &str) -> Option<i64> {
        article_number_candidates(part_number)
            .into_iter()
            .find_map(|candidate| self.by_number.get(&candidate.to_uppercase()).copied())
    }

    /// Exact article-number lookup
    pub fn get(&self, article_number: &str) -> Option<i64> {
        self.by_number
            .get(&article_number.trim().to_uppercase())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

// =========================================================================
// Line ordering
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ItemToken {
    Num(i64),
    Text(String),
}

/// Ordering key: dotted item numbers first (numeric tokens before text
/// tokens), then lines with only a line number, then the rest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineSortKey {
    bucket: u8,
    tokens: Vec<ItemToken>,
    part_number: String,
}

pub fn bom_line_sort_key(line: &BomLine) -> LineSortKey {
    let item_no = line.item_no.as_deref().unwrap_or("").trim();
    let part_number = line.part_number.clone();
    if !item_no.is_empty() {
        let tokens = item_no
            .split('.')
            .map(|token| {
                if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
                    token
                        .parse::<i64>()
                        .map(ItemToken::Num)
                        .unwrap_or_else(|_| ItemToken::Text(token.to_string()))
                } else {
                    ItemToken::Text(token.to_string())
                }
            })
            .collect();
        return LineSortKey {
            bucket: 0,
            tokens,
            part_number,
        };
    }
    match line.line_no {
        Some(line_no) => LineSortKey {
            bucket: 1,
            tokens: vec![ItemToken::Num(line_no)],
            part_number,
        },
        None => LineSortKey {
            bucket: 2,
            tokens: Vec::new(),
            part_number,
        },
    }
}

/// Stable sort; equal keys keep insertion order
pub fn sort_bom_lines(lines: &mut [BomLine]) {
    lines.sort_by_key(bom_line_sort_key);
}

/// Compare two dotted item numbers the way BOM lines are ordered
pub fn compare_item_numbers(a: &str, b: &str) -> Ordering {
    let key = |item: &str| {
        bom_line_sort_key(&BomLine {
            item_no: Some(item.to_string()),
            ..placeholder_line()
        })
    };
    key(a).cmp(&key(b))
}

fn placeholder_line() -> BomLine {
    BomLine {
        id: 0,
        article_id: 0,
        part_id: 0,
        part_number: String::new(),
        item_no: None,
        line_no: None,
        qty: None,
        unit: None,
        revision: None,
        description: None,
        material: None,
        finish: None,
        line_type: None,
        status: None,
        source_sheet: None,
        source_row_number: None,
        import_run_id: None,
    }
}

/// Parent position of a dotted item number ("4.32.1" -> "4.32")
pub fn parent_item_no(item_no: &str) -> Option<&str> {
    item_no.trim().rsplit_once('.').map(|(parent, _)| parent)
}

// =========================================================================
// Tree
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NodeKind {
    /// The article the tree was built for
    Article,
    /// A terminal part line
    Part,
    /// A line whose part number names another article
    AssemblyRef { article_id: i64 },
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// None only for the root
    pub line: Option<BomLine>,
    pub children: Vec<usize>,
    pub depth: usize,
}

impl TreeNode {
    /// Own quantity; blank counts as 1
    pub fn qty(&self) -> f64 {
        self.line.as_ref().and_then(|l| l.qty).unwrap_or(1.0)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Arena tree of one article's lines; node 0 is the article itself
#[derive(Debug, Clone)]
pub struct BomTree {
    pub article_id: i64,
    nodes: Vec<TreeNode>,
}

impl BomTree {
    pub const ROOT: usize = 0;

    /// Build the tree for an article from its lines, in any order
    pub fn build(article_id: i64, mut lines: Vec<BomLine>, refs: &ArticleRefIndex) -> Self {
        sort_bom_lines(&mut lines);

        let mut nodes = vec![TreeNode {
            kind: NodeKind::Article,
            line: None,
            children: Vec::new(),
            depth: 0,
        }];
        let mut by_item_no: HashMap<String, usize> = HashMap::new();

        for line in lines {
            let item_no = line.item_no.as_deref().unwrap_or("").trim().to_string();
            let parent = parent_item_no(&item_no)
                .and_then(|p| by_item_no.get(p).copied())
                .unwrap_or(Self::ROOT);

            let kind = match refs.resolve(&line.part_number) {
                Some(ref_id) => NodeKind::AssemblyRef { article_id: ref_id },
                None => NodeKind::Part,
            };

            let idx = nodes.len();
            nodes.push(TreeNode {
                kind,
                line: Some(line),
                children: Vec::new(),
                depth: nodes[parent].depth + 1,
            });
            nodes[parent].children.push(idx);
            if !item_no.is_empty() {
                by_item_no.insert(item_no, idx);
            }
        }

        Self { article_id, nodes }
    }

    /// Load and build an article's tree from a line source
    pub fn load(source: &impl BomSource, article_id: i64) -> Self {
        Self::build(
            article_id,
            source.article_lines(article_id),
            source.ref_index(),
        )
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[Self::ROOT]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Node indices in display order (depth first), root excluded
    pub fn walk(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.root().children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.nodes[idx].children.iter().rev());
        }
        order
    }

    /// Node holding a given BOM line
    pub fn find_line(&self, line_id: i64) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.line.as_ref().map(|l| l.id) == Some(line_id))
    }

    /// First node with a given item number
    pub fn find_item(&self, item_no: &str) -> Option<usize> {
        let item_no = item_no.trim();
        self.nodes.iter().position(|n| {
            n.line
                .as_ref()
                .and_then(|l| l.item_no.as_deref())
                .map(str::trim)
                == Some(item_no)
        })
    }
}

// =========================================================================
// Line sources
// =========================================================================

/// Read access to indexed BOM lines for tree building and explosion
pub trait BomSource {
    /// An article's lines, ordered
    fn article_lines(&self, article_id: i64) -> Vec<BomLine>;

    fn ref_index(&self) -> &ArticleRefIndex;

    /// The article a part number refers to, if any
    fn resolve_article(&self, part_number: &str) -> Option<i64> {
        self.ref_index().resolve(part_number)
    }
}

/// In-memory copy of every article's lines, taken once per query
#[derive(Debug, Clone, Default)]
pub struct BomSnapshot {
    lines: HashMap<i64, Vec<BomLine>>,
    refs: ArticleRefIndex,
}

impl BomSnapshot {
    pub fn load(store: &BomStore) -> Self {
        let mut lines: HashMap<i64, Vec<BomLine>> = HashMap::new();
        for line in store.all_bom_lines() {
            lines.entry(line.article_id).or_default().push(line);
        }
        for group in lines.values_mut() {
            sort_bom_lines(group);
        }
        Self {
            lines,
            refs: ArticleRefIndex::load(store),
        }
    }

    pub fn from_parts(lines: Vec<BomLine>, refs: ArticleRefIndex) -> Self {
        let mut grouped: HashMap<i64, Vec<BomLine>> = HashMap::new();
        for line in lines {
            grouped.entry(line.article_id).or_default().push(line);
        }
        for group in grouped.values_mut() {
            sort_bom_lines(group);
        }
        Self {
            lines: grouped,
            refs,
        }
    }

    /// Sub-assembly articles referenced by an article's lines, deduplicated
    pub fn referenced_articles(&self, article_id: i64) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.lines
            .get(&article_id)
            .into_iter()
            .flatten()
            .filter_map(|l| self.refs.resolve(&l.part_number))
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

impl BomSource for BomSnapshot {
    fn article_lines(&self, article_id: i64) -> Vec<BomLine> {
        self.lines.get(&article_id).cloned().unwrap_or_default()
    }

    fn ref_index(&self) -> &ArticleRefIndex {
        &self.refs
    }
}

/// First sub-assembly cycle reachable from `start`, as the article ids
/// along the loop (the repeated id appears at both ends)
pub fn find_reference_cycle(snapshot: &BomSnapshot, start: i64) -> Option<Vec<i64>> {
    fn visit(
        snapshot: &BomSnapshot,
        article_id: i64,
        path: &mut Vec<i64>,
        done: &mut HashSet<i64>,
    ) -> Option<Vec<i64>> {
        if let Some(pos) = path.iter().position(|id| *id == article_id) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(article_id);
            return Some(cycle);
        }
        if done.contains(&article_id) {
            return None;
        }
        path.push(article_id);
        for child in snapshot.referenced_articles(article_id) {
            if let Some(cycle) = visit(snapshot, child, path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(article_id);
        None
    }

    visit(snapshot, start, &mut Vec::new(), &mut HashSet::new())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: i64, article_id: i64, part: &str, item_no: Option<&str>, qty: Option<f64>) -> BomLine {
        BomLine {
            id,
            article_id,
            part_id: id,
            part_number: part.to_string(),
            item_no: item_no.map(String::from),
            qty,
            ..placeholder_line()
        }
    }

    #[test]
    fn test_article_number_candidates() {
        assert_eq!(
            article_number_candidates("ART-0017004"),
            vec!["ART-0017004", "0017004", "17004"]
        );
        assert_eq!(article_number_candidates("17004"), vec!["17004"]);
        assert_eq!(
            article_number_candidates("12-345-6789"),
            vec!["12-345-6789", "6789", "345"]
        );
        assert!(article_number_candidates("  ").is_empty());
        assert_eq!(article_number_candidates("AB-12"), vec!["AB-12"]);
    }

    #[test]
    fn test_ref_index_resolves_padded_part_numbers() {
        let refs = ArticleRefIndex::new([("17004", 1), ("500", 2)]);
        assert_eq!(refs.resolve("0017004"), Some(1));
        assert_eq!(refs.resolve("ASSY 500"), Some(2));
        assert_eq!(refs.resolve("SCREW-001"), None);
        assert_eq!(refs.get("500"), Some(2));
    }

    #[test]
    fn test_dotted_item_numbers_sort_numerically() {
        let mut lines = vec![
            line(1, 1, "C", Some("4.32.2"), None),
            line(2, 1, "A", Some("4"), None),
            line(3, 1, "B", Some("4.32.1"), None),
            line(4, 1, "D", Some("10"), None),
            line(5, 1, "E", Some("4.A"), None),
        ];
        sort_bom_lines(&mut lines);
        let order: Vec<_> = lines.iter().map(|l| l.item_no.clone().unwrap()).collect();
        assert_eq!(order, vec!["4", "4.32.1", "4.32.2", "4.A", "10"]);
        assert_eq!(compare_item_numbers("4.9", "4.10"), Ordering::Less);
    }

    #[test]
    fn test_blank_item_numbers_sort_last_by_line_number() {
        let mut first = line(1, 1, "Z", None, None);
        first.line_no = None;
        let mut second = line(2, 1, "Y", None, None);
        second.line_no = Some(5);
        let third = line(3, 1, "X", Some("2"), None);
        let mut lines = vec![first, second, third];
        sort_bom_lines(&mut lines);
        let ids: Vec<_> = lines.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_tree_nests_by_item_number_and_flags_subassemblies() {
        let refs = ArticleRefIndex::new([("500", 9)]);
        let lines = vec![
            line(1, 1, "P-3", Some("4.32.2"), None),
            line(2, 1, "500", Some("4"), Some(2.0)),
            line(3, 1, "P-2", Some("4.32.1"), None),
            line(4, 1, "P-1", Some("4.32"), None),
            line(5, 1, "P-9", Some("7.1"), None),
            line(6, 1, "P-0", None, None),
        ];
        let tree = BomTree::build(1, lines, &refs);
        assert_eq!(tree.len(), 7);

        let four = tree.find_item("4").unwrap();
        assert_eq!(tree.node(four).kind, NodeKind::AssemblyRef { article_id: 9 });
        assert_eq!(tree.node(four).qty(), 2.0);

        let sub = tree.find_item("4.32").unwrap();
        assert_eq!(tree.node(four).children, vec![sub]);
        assert_eq!(tree.node(sub).children.len(), 2);
        assert_eq!(tree.node(sub).depth, 2);

        // "7" is missing, so "7.1" hangs off the root
        let orphan = tree.find_item("7.1").unwrap();
        assert!(tree.root().children.contains(&orphan));

        let walked: Vec<_> = tree
            .walk()
            .into_iter()
            .map(|i| tree.node(i).line.as_ref().unwrap().part_number.clone())
            .collect();
        assert_eq!(walked, vec!["500", "P-1", "P-2", "P-3", "P-9", "P-0"]);
        assert_eq!(tree.find_line(6), Some(6));
    }

    #[test]
    fn test_find_reference_cycle() {
        let refs = ArticleRefIndex::new([("100", 1), ("200", 2), ("300", 3)]);
        let snapshot = BomSnapshot::from_parts(
            vec![
                line(1, 1, "200", Some("1"), None),
                line(2, 2, "100", Some("1"), None),
                line(3, 3, "P-1", Some("1"), None),
            ],
            refs,
        );
        assert_eq!(find_reference_cycle(&snapshot, 1), Some(vec![1, 2, 1]));
        assert_eq!(find_reference_cycle(&snapshot, 3), None);
    }
}
