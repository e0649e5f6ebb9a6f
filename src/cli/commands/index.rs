//! `bomdex index` command - run an indexing pass

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{load_config, open_store};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::indexer::{run_index, IndexStats};
use crate::core::store::RunStatus;

#[derive(clap::Args, Debug)]
pub struct IndexArgs {
    /// Enable developer mode for this run's configuration
    #[arg(long)]
    pub developer: bool,
}

pub fn run(args: IndexArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = load_config(global);
    if args.developer {
        config.developer_mode = true;
    }
    let store = open_store(&config)?;

    if !global.quiet && global.format == OutputFormat::Auto {
        eprintln!(
            "{} {}",
            style("Indexing").bold(),
            style(config.data_root.display()).cyan()
        );
    }

    let stats = run_index(&store, &config)?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
        }
        _ if global.quiet => {}
        format => {
            let mut table = stats_table(&stats);
            if format == OutputFormat::Md {
                println!("{}", table.with(Style::markdown()));
            } else {
                println!("{}", table.with(Style::rounded()));
            }
            print_status_line(&stats);
        }
    }
    Ok(())
}

fn stats_table(stats: &IndexStats) -> tabled::Table {
    let mut builder = Builder::default();
    builder.push_record(["Metric", "Value"]);
    let rows: [(&str, i64); 12] = [
        ("Run", stats.run_id),
        ("BOM files scanned", stats.files_scanned),
        ("BOMs parsed", stats.boms_parsed),
        ("BOMs unchanged", stats.boms_unchanged),
        ("Lines imported", stats.lines_imported),
        ("Articles removed", stats.articles_removed),
        ("Documents scanned", stats.documents_scanned),
        ("Documents updated", stats.documents_updated),
        ("Documents linked", stats.documents_linked),
        ("Documents removed", stats.documents_removed),
        ("Warnings", stats.warnings_count),
        ("Errors", stats.errors_count),
    ];
    for (label, value) in rows {
        builder.push_record([label.to_string(), value.to_string()]);
    }
    builder.build()
}

fn print_status_line(stats: &IndexStats) {
    match stats.status {
        RunStatus::Completed => {
            println!("{} Index up to date", style("✓").green());
        }
        _ => {
            println!(
                "{} Completed with {} warning(s) and {} error(s). See {}",
                style("!").yellow(),
                stats.warnings_count,
                stats.errors_count,
                style(format!("bomdex runs --issues {}", stats.run_id)).cyan()
            );
        }
    }
}
