//! `bomdex unlinked` command - documents no strategy could link

use miette::Result;

use crate::cli::commands::docs::{doc_row, DOC_COLUMNS};
use crate::cli::helpers::{load_config, open_store};
use crate::cli::GlobalOpts;
use crate::cli::table::TableFormatter;
use crate::core::store::LinkReason;

#[derive(clap::Args, Debug)]
pub struct UnlinkedArgs {
    /// Only documents with this reason code (e.g. revision_mismatch)
    #[arg(long)]
    pub reason: Option<String>,

    /// Maximum number of documents
    #[arg(long, short = 'n', default_value = "1000")]
    pub limit: usize,
}

pub fn run(args: UnlinkedArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    let reason = match args.reason.as_deref() {
        Some(code) => Some(LinkReason::parse(code).ok_or_else(|| {
            let codes: Vec<&str> = LinkReason::all()
                .iter()
                .filter(|r| !r.is_match())
                .map(|r| r.as_str())
                .collect();
            miette::miette!(help = format!("known codes: {}", codes.join(", ")), "unknown reason '{}'", code)
        })?),
        None => None,
    };

    let docs = store.unlinked_documents(args.limit);
    let rows = docs
        .iter()
        .filter(|d| reason.is_none() || d.link_reason == reason)
        .map(doc_row);
    TableFormatter::new(DOC_COLUMNS, "document").output(rows, global.format)
}
