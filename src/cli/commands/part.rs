//! `bomdex part` command - part details, usages and classification

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::commands::where_used::{usage_row, USAGE_COLUMNS};
use crate::cli::helpers::{load_config, open_store, opt_str};
use crate::cli::table::TableFormatter;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::{LinkTarget, PartType};

#[derive(clap::Args, Debug)]
pub struct PartArgs {
    /// Part number
    pub part_number: String,

    /// Classify the part (mechanical, fastener, packaging, label, documentation, service, other)
    #[arg(long, conflicts_with = "clear_type")]
    pub set_type: Option<String>,

    /// Remove the part's classification
    #[arg(long)]
    pub clear_type: bool,
}

pub fn run(args: PartArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    let part = store.part_by_number(&args.part_number).ok_or_else(|| {
        miette::miette!(
            help = "part numbers are matched without regard to case",
            "part '{}' not found",
            args.part_number
        )
    })?;

    if args.set_type.is_some() || args.clear_type {
        store.update_part_type(part.id, args.set_type.as_deref())?;
        if !global.quiet {
            let shown = args.set_type.as_deref().and_then(PartType::parse);
            println!(
                "{} {} type set to {}",
                style("✓").green(),
                style(&part.part_number).cyan(),
                shown.map(|t| t.as_str()).unwrap_or("(none)")
            );
        }
        return Ok(());
    }

    let usages = store.part_usages(part.id);
    let documents = store.documents_for(LinkTarget::Part, part.id);

    match global.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "part": part,
                "usages": usages,
                "documents": documents,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Auto => {
            let mut builder = Builder::default();
            builder.push_record(["Part number".to_string(), part.part_number.clone()]);
            builder.push_record(["Description".to_string(), opt_str(part.description.as_deref())]);
            builder.push_record([
                "Type".to_string(),
                part.part_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
            ]);
            builder.push_record(["Used in".to_string(), format!("{} line(s)", usages.len())]);
            builder.push_record(["Documents".to_string(), documents.len().to_string()]);
            println!("{}", builder.build().with(Style::rounded()));
            println!();
            TableFormatter::new(USAGE_COLUMNS, "usage").output(usages.iter().map(usage_row), global.format)?;
        }
        format => {
            TableFormatter::new(USAGE_COLUMNS, "usage").output(usages.iter().map(usage_row), format)?;
        }
    }
    Ok(())
}
