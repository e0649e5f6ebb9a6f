//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    articles::ArticlesArgs, completions::CompletionsArgs, docs::DocsArgs, edit_line::EditLineArgs,
    explode::ExplodeArgs,
    index::IndexArgs, part::PartArgs, runs::RunsArgs, show::ShowArgs,
    suggest::SuggestRevisionsArgs, unlinked::UnlinkedArgs, where_used::WhereUsedArgs,
};

#[derive(Parser)]
#[command(name = "bomdex")]
#[command(author, version, about = "BOM index and document reconciliation")]
#[command(long_about = "Indexes spreadsheet BOMs and loose engineering documents into a queryable SQLite index, links documents to parts and explodes assemblies into order lists.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Data root holding the BOMS folder and document folders
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    /// Index database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an indexing pass over the data root
    Index(IndexArgs),

    /// List indexed articles
    Articles(ArticlesArgs),

    /// Show an article's BOM tree
    Show(ShowArgs),

    /// Documents linked to an article or part
    Docs(DocsArgs),

    /// Documents without a link, with the reason
    Unlinked(UnlinkedArgs),

    /// Part details, usages and classification
    Part(PartArgs),

    /// Articles using a part number
    WhereUsed(WhereUsedArgs),

    /// Flatten an article or BOM line into an order list
    Explode(ExplodeArgs),

    /// Import run history and issues
    Runs(RunsArgs),

    /// Suggest revisions for revision-less lines (developer mode)
    SuggestRevisions(SuggestRevisionsArgs),

    /// Write edits to a BOM line back into its source file (developer mode)
    EditLine(EditLineArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (tree for show, tsv for lists)
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}
