//! Store type definitions
//!
//! Row structs returned by queries plus the closed vocabularies stored as text.

use serde::Serialize;

// =========================================================================
// Vocabularies
// =========================================================================

/// Part classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    Mechanical,
    Fastener,
    Packaging,
    Label,
    Documentation,
    Service,
    Other,
}

impl PartType {
    pub fn all() -> &'static [PartType] {
        &[
            PartType::Mechanical,
            PartType::Fastener,
            PartType::Packaging,
            PartType::Label,
            PartType::Documentation,
            PartType::Service,
            PartType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartType::Mechanical => "mechanical",
            PartType::Fastener => "fastener",
            PartType::Packaging => "packaging",
            PartType::Label => "label",
            PartType::Documentation => "documentation",
            PartType::Service => "service",
            PartType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::all().iter().copied().find(|t| t.as_str() == value)
    }
}

/// Coarse document type derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Pdf,
    Step,
    Dwg,
    Other,
}

impl DocType {
    /// Map an extension (with or without leading dot, any case)
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => DocType::Pdf,
            "step" | "stp" => DocType::Step,
            "dwg" | "dxf" => DocType::Dwg,
            _ => DocType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Pdf => "pdf",
            DocType::Step => "step",
            DocType::Dwg => "dwg",
            DocType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        Self::from_extension(value)
    }
}

/// What a document is linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Article,
    Part,
}

impl LinkTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkTarget::Article => "article",
            LinkTarget::Part => "part",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "article" => Some(LinkTarget::Article),
            "part" => Some(LinkTarget::Part),
            _ => None,
        }
    }
}

/// Why a document was (or was not) linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkReason {
    MatchedPartAndRevision,
    MatchedPartNoRevision,
    MatchedPartSingleRevision,
    MatchedPartFallback,
    MatchedPartNormalized,
    MatchedPartSubstring,
    MatchedPartDescription,
    MatchedPartTokenOverlap,
    MatchedArticle,
    PartNotFoundInBomIndex,
    RevisionMismatch,
    AmbiguousRevisionRequired,
    NoPartTokenInFilename,
    AmbiguousOrMissingRevision,
}

impl LinkReason {
    pub fn all() -> &'static [LinkReason] {
        &[
            LinkReason::MatchedPartAndRevision,
            LinkReason::MatchedPartNoRevision,
            LinkReason::MatchedPartSingleRevision,
            LinkReason::MatchedPartFallback,
            LinkReason::MatchedPartNormalized,
            LinkReason::MatchedPartSubstring,
            LinkReason::MatchedPartDescription,
            LinkReason::MatchedPartTokenOverlap,
            LinkReason::MatchedArticle,
            LinkReason::PartNotFoundInBomIndex,
            LinkReason::RevisionMismatch,
            LinkReason::AmbiguousRevisionRequired,
            LinkReason::NoPartTokenInFilename,
            LinkReason::AmbiguousOrMissingRevision,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkReason::MatchedPartAndRevision => "matched_part_and_revision",
            LinkReason::MatchedPartNoRevision => "matched_part_no_revision",
            LinkReason::MatchedPartSingleRevision => "matched_part_single_revision",
            LinkReason::MatchedPartFallback => "matched_part_fallback",
            LinkReason::MatchedPartNormalized => "matched_part_normalized",
            LinkReason::MatchedPartSubstring => "matched_part_substring",
            LinkReason::MatchedPartDescription => "matched_part_description",
            LinkReason::MatchedPartTokenOverlap => "matched_part_token_overlap",
            LinkReason::MatchedArticle => "matched_article",
            LinkReason::PartNotFoundInBomIndex => "part_not_found_in_bom_index",
            LinkReason::RevisionMismatch => "revision_mismatch",
            LinkReason::AmbiguousRevisionRequired => "ambiguous_revision_required",
            LinkReason::NoPartTokenInFilename => "no_part_token_in_filename",
            LinkReason::AmbiguousOrMissingRevision => "ambiguous_or_missing_revision",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|r| r.as_str() == value)
    }

    /// Whether this reason accompanies a successful link
    pub fn is_match(&self) -> bool {
        self.as_str().starts_with("matched_")
    }
}

impl std::fmt::Display for LinkReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import run lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithWarnings => "completed_with_warnings",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "completed" => RunStatus::Completed,
            "completed_with_warnings" => RunStatus::CompletedWithWarnings,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value == "error" {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

// =========================================================================
// Rows
// =========================================================================

/// An indexed BOM file identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub article_number: String,
    pub title: Option<String>,
    pub source_bom_path: Option<String>,
    pub source_bom_filename: Option<String>,
    pub source_bom_modified_at: Option<String>,
    pub source_bom_size_bytes: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Article list entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub article_number: String,
    pub title: Option<String>,
    pub bom_line_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub id: i64,
    pub part_number: String,
    pub description: Option<String>,
    pub part_type: Option<PartType>,
}

/// A BOM line joined with its part number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomLine {
    pub id: i64,
    pub article_id: i64,
    pub part_id: i64,
    pub part_number: String,
    pub item_no: Option<String>,
    pub line_no: Option<i64>,
    pub qty: Option<f64>,
    pub unit: Option<String>,
    pub revision: Option<String>,
    /// Line description, falling back to the part description
    pub description: Option<String>,
    pub material: Option<String>,
    pub finish: Option<String>,
    pub line_type: Option<String>,
    pub status: Option<String>,
    pub source_sheet: Option<String>,
    pub source_row_number: Option<i64>,
    pub import_run_id: Option<i64>,
}

/// An indexed file from a document folder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub path: String,
    pub filename: String,
    pub extension: Option<String>,
    pub size_bytes: Option<i64>,
    pub modified_at: Option<String>,
    pub linked_to_type: Option<LinkTarget>,
    pub linked_id: Option<i64>,
    pub doc_type: Option<DocType>,
    pub part_revision: Option<String>,
    pub link_reason: Option<LinkReason>,
    pub import_run_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRun {
    pub id: i64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub files_scanned: i64,
    pub boms_parsed: i64,
    pub lines_imported: i64,
    pub warnings_count: i64,
    pub errors_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportIssue {
    pub id: i64,
    pub import_run_id: i64,
    pub severity: Severity,
    pub file_path: Option<String>,
    pub sheet_name: Option<String>,
    pub row_number: Option<i64>,
    pub message: String,
    pub raw_row_json: Option<String>,
}

/// One use of a part inside an article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartUsage {
    pub article_id: i64,
    pub article_number: String,
    pub title: Option<String>,
    pub part_number: String,
    pub item_no: Option<String>,
    pub qty: Option<f64>,
    pub revision: Option<String>,
    pub material: Option<String>,
}

/// A sub-assembly relation between two articles through one BOM line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleLink {
    /// The article on the other side of the relation
    pub article_id: i64,
    pub article_number: String,
    pub title: Option<String>,
    pub item_no: Option<String>,
    pub part_number: String,
    pub qty: Option<f64>,
    pub revision: Option<String>,
}

// =========================================================================
// Write-side records
// =========================================================================

/// Size and modification stamp of a source file, used for change detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    pub path: String,
    pub modified_at: String,
    pub size_bytes: i64,
}

/// Counters stored on an import run when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub files_scanned: i64,
    pub boms_parsed: i64,
    pub lines_imported: i64,
    pub warnings_count: i64,
    pub errors_count: i64,
}

/// An issue to record against a run
#[derive(Debug, Clone, Default)]
pub struct NewIssue<'a> {
    pub file_path: Option<&'a str>,
    pub sheet_name: Option<&'a str>,
    pub row_number: Option<i64>,
    pub message: &'a str,
    pub raw_row: Option<serde_json::Value>,
}

/// A document as discovered on disk plus its match result
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub file: FileState,
    pub filename: String,
    pub extension: String,
    pub link: Option<(LinkTarget, i64)>,
    pub part_revision: Option<String>,
    pub link_reason: Option<LinkReason>,
}

/// Result of replacing an article's line set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub article_id: i64,
    pub lines_inserted: i64,
    pub rows_skipped: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_from_extension() {
        assert_eq!(DocType::from_extension(".PDF"), DocType::Pdf);
        assert_eq!(DocType::from_extension("stp"), DocType::Step);
        assert_eq!(DocType::from_extension(".dxf"), DocType::Dwg);
        assert_eq!(DocType::from_extension(".docx"), DocType::Other);
        assert_eq!(DocType::from_extension(""), DocType::Other);
    }

    #[test]
    fn test_link_reason_codes_round_trip_through_text() {
        for reason in LinkReason::all() {
            assert_eq!(LinkReason::parse(reason.as_str()), Some(*reason));
        }
        assert!(LinkReason::MatchedArticle.is_match());
        assert!(!LinkReason::RevisionMismatch.is_match());
    }

    #[test]
    fn test_part_type_parse_is_lenient_on_case() {
        assert_eq!(PartType::parse(" Fastener "), Some(PartType::Fastener));
        assert_eq!(PartType::parse("widget"), None);
    }
}
