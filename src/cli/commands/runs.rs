//! `bomdex runs` command - import run history and issues

use miette::Result;

use crate::cli::helpers::{load_config, open_store, opt_str};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::GlobalOpts;

const RUN_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "RUN", 6),
    ColumnDef::new("started_at", "STARTED", 28),
    ColumnDef::new("status", "STATUS", 24),
    ColumnDef::new("files_scanned", "FILES", 7),
    ColumnDef::new("boms_parsed", "PARSED", 7),
    ColumnDef::new("lines_imported", "LINES", 8),
    ColumnDef::new("warnings_count", "WARN", 6),
    ColumnDef::new("errors_count", "ERR", 6),
];

const ISSUE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 6),
    ColumnDef::new("severity", "SEVERITY", 9),
    ColumnDef::new("file_path", "FILE", 50),
    ColumnDef::new("sheet_name", "SHEET", 14),
    ColumnDef::new("row_number", "ROW", 6),
    ColumnDef::new("message", "MESSAGE", 60),
];

#[derive(clap::Args, Debug)]
pub struct RunsArgs {
    /// Show the issues of one run (defaults to the latest run)
    #[arg(long, num_args = 0..=1, value_name = "RUN")]
    pub issues: Option<Option<i64>>,

    /// Number of runs to list
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

pub fn run(args: RunsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let store = open_store(&config)?;

    if let Some(run_id) = args.issues {
        let run_id = match run_id {
            Some(id) => id,
            None => store
                .latest_import_run()
                .map(|r| r.id)
                .ok_or_else(|| miette::miette!("no import runs recorded yet"))?,
        };
        let rows = store.import_issues(run_id).into_iter().map(|issue| {
            TableRow::new()
                .cell("id", CellValue::Id(issue.id))
                .cell("severity", CellValue::Status(issue.severity.as_str().to_string()))
                .cell("file_path", CellValue::Text(opt_str(issue.file_path.as_deref())))
                .cell("sheet_name", CellValue::Text(opt_str(issue.sheet_name.as_deref())))
                .cell(
                    "row_number",
                    CellValue::Number(issue.row_number.map(|r| r.to_string()).unwrap_or_default()),
                )
                .cell("message", CellValue::Text(issue.message))
        });
        return TableFormatter::new(ISSUE_COLUMNS, "issue").output(rows, global.format);
    }

    let rows = store.import_runs(args.limit).into_iter().map(|run| {
        TableRow::new()
            .cell("id", CellValue::Id(run.id))
            .cell("started_at", CellValue::Text(opt_str(run.started_at.as_deref())))
            .cell("status", CellValue::Status(run.status.as_str().to_string()))
            .cell("files_scanned", CellValue::Number(run.files_scanned.to_string()))
            .cell("boms_parsed", CellValue::Number(run.boms_parsed.to_string()))
            .cell("lines_imported", CellValue::Number(run.lines_imported.to_string()))
            .cell("warnings_count", CellValue::Number(run.warnings_count.to_string()))
            .cell("errors_count", CellValue::Number(run.errors_count.to_string()))
    });
    TableFormatter::new(RUN_COLUMNS, "run").output(rows, global.format)
}
