//! Document-to-part matching
//!
//! Strategies run in priority order and the first success wins:
//! 1. drawing-number token (`NN-NNNNN`) with optional revision suffix
//! 2. part-number-shaped token anywhere in the filename
//! 3. normalized filename equals a normalized part number
//! 4. normalized part number inside the normalized filename
//! 5. normalized description inside the normalized filename
//! 6. description word overlap, only when the winner is clear
//! 7. a digit run naming an article
//!
//! An unmatched document always carries a reason code.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use miette::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::config::{IndexConfig, MatchingConfig};
use crate::core::graph::ArticleRefIndex;
use crate::core::store::{BomStore, LinkReason, LinkTarget, Part};

static PART_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([A-Z]{0,4}\d{3,}[A-Z0-9\-]*)\b").expect("valid regex"));
static DRAWING_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d{2}-\d{5,6})(?:[^0-9]|$)").expect("valid regex"));
static REV_EXPLICIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\-]REV[_\-]?([A-Z0-9]+)\b").expect("valid regex"));
static DRAWING_PART_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}-\d{5,6})[_\-]([A-Z0-9]+)\b").expect("valid regex"));
static REV_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\-]R([A-Z0-9]+)\b").expect("valid regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").expect("valid regex"));

/// Words ignored when comparing descriptions with filenames
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "van", "het", "een", "voor", "met", "en", "de", "rev", "pdf",
    "step", "stp", "dwg", "dxf", "tekening", "drawing",
];

const MIN_SUBSTRING_PART_LEN: usize = 4;
const MIN_SUBSTRING_DESCRIPTION_LEN: usize = 8;

/// Result of matching one filename
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub link: Option<(LinkTarget, i64)>,
    pub part_revision: Option<String>,
    pub reason: LinkReason,
}

impl MatchOutcome {
    fn part(part_id: i64, revision: Option<String>, reason: LinkReason) -> Self {
        Self {
            link: Some((LinkTarget::Part, part_id)),
            part_revision: revision,
            reason,
        }
    }

    fn unmatched(reason: LinkReason) -> Self {
        Self {
            link: None,
            part_revision: None,
            reason,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }
}

#[derive(Debug, Clone)]
struct CatalogPart {
    id: i64,
    normalized_number: String,
    normalized_description: String,
    description_tokens: HashSet<String>,
}

/// Snapshot of the part universe used for matching one indexing pass
#[derive(Debug, Clone, Default)]
pub struct PartCatalog {
    parts: Vec<CatalogPart>,
    by_number: HashMap<String, usize>,
    /// Distinct non-blank revisions per part id, uppercase
    revisions: HashMap<i64, BTreeSet<String>>,
    articles: ArticleRefIndex,
}

impl PartCatalog {
    pub fn new(
        parts: Vec<Part>,
        line_revisions: Vec<(i64, Option<String>)>,
        articles: ArticleRefIndex,
    ) -> Self {
        let mut catalog = PartCatalog {
            articles,
            ..Default::default()
        };

        for part in parts {
            let part_number = part.part_number.trim().to_uppercase();
            let description = part.description.unwrap_or_default();
            catalog
                .by_number
                .insert(part_number.clone(), catalog.parts.len());
            catalog.parts.push(CatalogPart {
                id: part.id,
                normalized_number: normalize(&part_number),
                normalized_description: normalize(&description),
                description_tokens: tokenize(&description),
            });
        }

        for (part_id, revision) in line_revisions {
            let entry = catalog.revisions.entry(part_id).or_default();
            if let Some(rev) = revision.map(|r| r.trim().to_uppercase()).filter(|r| !r.is_empty()) {
                entry.insert(rev);
            }
        }

        catalog
    }

    pub fn load(store: &BomStore) -> Self {
        Self::new(
            store.all_parts(),
            store.part_line_revisions(),
            ArticleRefIndex::load(store),
        )
    }

    fn part_id(&self, part_number: &str) -> Option<i64> {
        self.by_number
            .get(&part_number.trim().to_uppercase())
            .map(|idx| self.parts[*idx].id)
    }

    fn revisions(&self, part_id: i64) -> Option<&BTreeSet<String>> {
        self.revisions.get(&part_id)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Uppercase alphanumerics only ("15-00407 b" -> "1500407B")
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Lowercase words of 3+ characters that are not pure digits or stopwords
pub fn tokenize(value: &str) -> HashSet<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string())
}

/// Drawing-number part token and revision suffix encoded in a filename.
///
/// "15-00407_B.pdf" -> ("15-00407", Some("B"))
pub fn parse_part_and_revision(filename: &str) -> Option<(String, Option<String>)> {
    let stem = file_stem(filename).to_uppercase();
    let part_number = DRAWING_PART.captures(&stem)?.get(1)?.as_str().to_string();

    let revision = REV_EXPLICIT
        .captures(&stem)
        .and_then(|c| c.get(1))
        .or_else(|| {
            DRAWING_PART_SUFFIX
                .captures_iter(&stem)
                .find(|c| c.get(1).map(|m| m.as_str()) == Some(part_number.as_str()))
                .and_then(|c| c.get(2))
        })
        .or_else(|| REV_SHORT.captures(&stem).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_uppercase());

    Some((part_number, revision))
}

/// Match a filename against the catalog
pub fn match_document(catalog: &PartCatalog, filename: &str, config: &MatchingConfig) -> MatchOutcome {
    let mut pending_reason = None;
    match match_part_and_revision(catalog, filename) {
        Some(outcome) if outcome.is_linked() => return outcome,
        Some(outcome) if outcome.reason != LinkReason::PartNotFoundInBomIndex => return outcome,
        Some(outcome) => pending_reason = Some(outcome.reason),
        None => {}
    }

    let stem = file_stem(filename);
    let normalized_stem = normalize(&stem);

    if let Some(part_id) = match_part_token(catalog, filename) {
        return MatchOutcome::part(part_id, None, LinkReason::MatchedPartFallback);
    }
    if let Some(part_id) = match_normalized_equal(catalog, &normalized_stem) {
        return MatchOutcome::part(part_id, None, LinkReason::MatchedPartNormalized);
    }
    if let Some(part_id) = match_normalized_substring(catalog, &normalized_stem) {
        return MatchOutcome::part(part_id, None, LinkReason::MatchedPartSubstring);
    }
    if let Some(part_id) = match_description_substring(catalog, &normalized_stem) {
        return MatchOutcome::part(part_id, None, LinkReason::MatchedPartDescription);
    }
    if let Some(part_id) = match_token_overlap(catalog, &stem, config) {
        return MatchOutcome::part(part_id, None, LinkReason::MatchedPartTokenOverlap);
    }
    if let Some(article_id) = match_article(catalog, &stem) {
        return MatchOutcome {
            link: Some((LinkTarget::Article, article_id)),
            part_revision: None,
            reason: LinkReason::MatchedArticle,
        };
    }

    MatchOutcome::unmatched(pending_reason.unwrap_or_else(|| classify_unmatched(catalog, filename)))
}

/// Strategy 1. None when the filename carries no drawing-number token.
fn match_part_and_revision(catalog: &PartCatalog, filename: &str) -> Option<MatchOutcome> {
    let (part_number, revision) = parse_part_and_revision(filename)?;
    let Some(part_id) = catalog.part_id(&part_number) else {
        return Some(MatchOutcome::unmatched(LinkReason::PartNotFoundInBomIndex));
    };
    let known = catalog.revisions(part_id);

    if let Some(revision) = revision {
        let present = known.map(|revs| revs.contains(&revision)).unwrap_or(false);
        return Some(if present {
            MatchOutcome::part(part_id, Some(revision), LinkReason::MatchedPartAndRevision)
        } else {
            MatchOutcome::unmatched(LinkReason::RevisionMismatch)
        });
    }

    Some(match known.map(|revs| revs.len()).unwrap_or(0) {
        0 => MatchOutcome::part(part_id, None, LinkReason::MatchedPartNoRevision),
        1 => MatchOutcome::part(part_id, None, LinkReason::MatchedPartSingleRevision),
        _ => MatchOutcome::unmatched(LinkReason::AmbiguousRevisionRequired),
    })
}

/// Strategy 2: first part-number-shaped token that is a known part
fn match_part_token(catalog: &PartCatalog, filename: &str) -> Option<i64> {
    PART_TOKEN
        .captures_iter(filename)
        .filter_map(|c| c.get(1))
        .find_map(|m| catalog.part_id(m.as_str()))
}

/// Strategy 3
fn match_normalized_equal(catalog: &PartCatalog, normalized_stem: &str) -> Option<i64> {
    if normalized_stem.is_empty() {
        return None;
    }
    catalog
        .parts
        .iter()
        .find(|p| p.normalized_number == normalized_stem)
        .map(|p| p.id)
}

/// Strategy 4: longest contained part number wins
fn match_normalized_substring(catalog: &PartCatalog, normalized_stem: &str) -> Option<i64> {
    longest_contained(catalog, normalized_stem, MIN_SUBSTRING_PART_LEN, |p| {
        &p.normalized_number
    })
}

/// Strategy 5: longest contained description wins
fn match_description_substring(catalog: &PartCatalog, normalized_stem: &str) -> Option<i64> {
    longest_contained(catalog, normalized_stem, MIN_SUBSTRING_DESCRIPTION_LEN, |p| {
        &p.normalized_description
    })
}

fn longest_contained(
    catalog: &PartCatalog,
    haystack: &str,
    min_len: usize,
    key: impl Fn(&CatalogPart) -> &String,
) -> Option<i64> {
    let mut best: Option<(usize, i64)> = None;
    for part in &catalog.parts {
        let needle = key(part);
        let len = needle.chars().count();
        if len < min_len || !haystack.contains(needle.as_str()) {
            continue;
        }
        if best.map_or(true, |(best_len, _)| len > best_len) {
            best = Some((len, part.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Strategy 6: share of description words present in the filename
fn match_token_overlap(catalog: &PartCatalog, stem: &str, config: &MatchingConfig) -> Option<i64> {
    let file_tokens = tokenize(stem);
    if file_tokens.is_empty() {
        return None;
    }

    // (score, overlap, part id), every part sharing at least one word
    let mut scored: Vec<(f64, usize, i64)> = catalog
        .parts
        .iter()
        .filter(|p| !p.description_tokens.is_empty())
        .filter_map(|p| {
            let overlap = p.description_tokens.intersection(&file_tokens).count();
            (overlap > 0).then(|| {
                (
                    overlap as f64 / p.description_tokens.len() as f64,
                    overlap,
                    p.id,
                )
            })
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (best_score, best_overlap, best_id) = *scored.first()?;
    let runner_up = scored.get(1).map(|s| s.0).unwrap_or(0.0);
    let accepted = best_overlap >= config.min_overlap_tokens
        && best_score >= config.min_score
        && best_score - runner_up >= config.min_margin;
    accepted.then_some(best_id)
}

/// Strategy 7: a standalone digit run equal to an article number
fn match_article(catalog: &PartCatalog, stem: &str) -> Option<i64> {
    DIGIT_RUN
        .find_iter(stem)
        .find_map(|m| catalog.articles.resolve(m.as_str()))
}

/// Reason code for a filename no strategy could link
pub fn classify_unmatched(catalog: &PartCatalog, filename: &str) -> LinkReason {
    match parse_part_and_revision(filename) {
        None => LinkReason::NoPartTokenInFilename,
        Some((part_number, _)) if catalog.part_id(&part_number).is_none() => {
            LinkReason::PartNotFoundInBomIndex
        }
        Some((_, Some(_))) => LinkReason::RevisionMismatch,
        Some((_, None)) => LinkReason::AmbiguousOrMissingRevision,
    }
}

/// A proposed revision for a BOM line that has none
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSuggestion {
    pub line_id: i64,
    pub item_no: Option<String>,
    pub part_number: String,
    pub suggested_revision: String,
}

/// Suggest revisions for an article's revision-less lines from the revision
/// letters found in indexed document names. Only available in developer mode.
pub fn suggest_revisions(store: &BomStore, article_id: i64, config: &IndexConfig) -> Result<Vec<RevisionSuggestion>> {
    config.require_developer_mode("revision suggestion")?;

    let mut suggestions = Vec::new();
    for line in store.article_lines(article_id) {
        let has_revision = line.revision.as_deref().is_some_and(|r| !r.trim().is_empty());
        let part_number = line.part_number.trim().to_uppercase();
        if has_revision || part_number.is_empty() {
            continue;
        }

        let best = store
            .documents_with_filename_containing(&part_number)
            .iter()
            .filter_map(|doc| parse_part_and_revision(&doc.filename))
            .filter(|(part, _)| *part == part_number)
            .filter_map(|(_, revision)| revision?.chars().next())
            .filter(|c| c.is_alphabetic())
            .max();

        if let Some(letter) = best {
            suggestions.push(RevisionSuggestion {
                line_id: line.id,
                item_no: line.item_no.clone(),
                part_number,
                suggested_revision: letter.to_string(),
            });
        }
    }
    Ok(suggestions)
}
