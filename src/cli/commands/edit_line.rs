//! `bomdex edit-line` command - write BOM line edits back to the source file

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, open_store};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::mapping::CanonicalField;
use crate::core::writeback::{apply_line_edits, LineEdit, WriteBackSummary};

#[derive(clap::Args, Debug)]
pub struct EditLineArgs {
    /// BOM line id (see `bomdex show <article> --flat`)
    pub line: i64,

    /// Field assignment such as `rev=C` or `qty=2` (repeatable)
    #[arg(long = "set", short = 's', value_name = "FIELD=VALUE", required = true, value_parser = parse_assignment)]
    pub assignments: Vec<(CanonicalField, String)>,

    /// Enable developer mode for this invocation
    #[arg(long)]
    pub developer: bool,
}

pub fn run(args: EditLineArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = load_config(global);
    if args.developer {
        config.developer_mode = true;
    }
    let store = open_store(&config)?;

    let edit = args
        .assignments
        .into_iter()
        .fold(LineEdit::new(args.line), |edit, (field, value)| edit.set(field, value));
    let summary = apply_line_edits(&store, &[edit], &config)?;
    print_summary(&summary, global)
}

/// Accepts canonical names and any header synonym ("rev", "aantal", ...)
fn parse_assignment(raw: &str) -> Result<(CanonicalField, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field = CanonicalField::from_header(key).ok_or_else(|| {
        let known: Vec<&str> = CanonicalField::all().iter().map(|f| f.as_str()).collect();
        format!("unknown field '{}' (expected one of: {})", key, known.join(", "))
    })?;
    Ok((field, value.to_string()))
}

pub(crate) fn print_summary(summary: &WriteBackSummary, global: &GlobalOpts) -> Result<()> {
    if global.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary).into_diagnostic()?);
        return Ok(());
    }
    if global.quiet {
        return Ok(());
    }

    if summary.files_written == 0 {
        println!("{}", style("Nothing written.").yellow());
    } else {
        println!(
            "{} Wrote {} cell(s) in {} file(s)",
            style("✓").green(),
            summary.cells_written,
            summary.files_written
        );
    }
    if summary.fields_skipped > 0 {
        println!(
            "{} {} field(s) skipped: the sheet has no column for them",
            style("!").yellow(),
            summary.fields_skipped
        );
    }
    if let Some(stats) = &summary.index {
        println!(
            "  Re-indexed: {} BOM(s), {} line(s), {} warning(s), {} error(s)",
            stats.boms_parsed, stats.lines_imported, stats.warnings_count, stats.errors_count
        );
    }
    Ok(())
}
