//! Integration tests for the bomdex CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "Item,Part Number,Description,Qty,Rev,Material";

/// Helper to get a bomdex command bound to a data root and its own index
fn bomdex(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bomdex").unwrap();
    cmd.env_remove("BOMDEX_DATA_ROOT")
        .env_remove("BOMDEX_DB")
        .env_remove("BOMDEX_DEVELOPER_MODE")
        .env_remove("RUST_LOG")
        .arg("--data-root")
        .arg(root)
        .arg("--db")
        .arg(root.join("index.db"));
    cmd
}

fn write_bom(root: &Path, name: &str, rows: &[&str]) {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    fs::write(root.join("BOMS").join(name), content).unwrap();
}

/// Frame 100 uses 3x knob assembly 200 and 2x bracket 15-00407
fn setup_data_root() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("BOMS")).unwrap();
    fs::create_dir_all(tmp.path().join("PDF")).unwrap();
    write_bom(
        tmp.path(),
        "BOM 100 Frame.csv",
        &[
            "1,200,Knob assembly,3,,",
            "2,15-00407,Bracket,2,B,S235",
            "2.1,M4X10,Screw,4,,A2",
        ],
    );
    write_bom(tmp.path(), "BOM 200 Knob.csv", &["1,KNOB-001,Knob,1,,PA6"]);
    fs::write(tmp.path().join("PDF").join("15-00407_B.pdf"), b"%PDF").unwrap();
    fs::write(tmp.path().join("PDF").join("15-00407_A.pdf"), b"%PDF").unwrap();
    tmp
}

fn indexed_data_root() -> TempDir {
    let tmp = setup_data_root();
    bomdex(tmp.path()).arg("index").assert().success();
    tmp
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    Command::cargo_bin("bomdex")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("explode"))
        .stdout(predicate::str::contains("where-used"));
}

#[test]
fn test_version_displays() {
    Command::cargo_bin("bomdex")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bomdex"));
}

#[test]
fn test_unknown_command_fails() {
    Command::cargo_bin("bomdex")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn test_completions_generate() {
    Command::cargo_bin("bomdex")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bomdex"));
}

// ============================================================================
// Index Tests
// ============================================================================

#[test]
fn test_index_reports_stats_as_json() {
    let tmp = setup_data_root();
    let stats = json_output(bomdex(tmp.path()).args(["index", "-f", "json"]));
    assert_eq!(stats["boms_parsed"], 2);
    assert_eq!(stats["lines_imported"], 4);
    assert_eq!(stats["documents_scanned"], 2);
    assert_eq!(stats["status"], "completed");

    let again = json_output(bomdex(tmp.path()).args(["index", "-f", "json"]));
    assert_eq!(again["boms_parsed"], 0);
    assert_eq!(again["boms_unchanged"], 2);
}

#[test]
fn test_index_without_bom_folder_fails() {
    let tmp = TempDir::new().unwrap();
    bomdex(tmp.path())
        .arg("index")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BOM folder not found"));
}

#[test]
fn test_parse_failure_is_listed_in_run_issues() {
    let tmp = setup_data_root();
    fs::write(tmp.path().join("BOMS").join("BOM 300.xlsx"), b"garbage").unwrap();
    bomdex(tmp.path())
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 error(s)"));

    bomdex(tmp.path())
        .args(["runs", "--issues"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BOM 300.xlsx"))
        .stdout(predicate::str::contains("error"));

    bomdex(tmp.path())
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed_with_warnings"));
}

// ============================================================================
// Query Tests
// ============================================================================

#[test]
fn test_articles_lists_and_filters() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .arg("articles")
        .assert()
        .success()
        .stdout(predicate::str::contains("100"))
        .stdout(predicate::str::contains("Knob"))
        .stdout(predicate::str::contains("2 article(s) found"));

    // 200 is used inside 100
    bomdex(tmp.path())
        .args(["articles", "--top-level", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Frame"))
        .stdout(predicate::str::contains("Knob").not());

    // found through its line's part number
    bomdex(tmp.path())
        .args(["articles", "knob-001", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("200"));
}

#[test]
fn test_show_renders_tree_with_subassemblies() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["show", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[sub-assembly 200]"))
        .stdout(predicate::str::contains("2.1"))
        .stdout(predicate::str::contains("M4X10"));
}

#[test]
fn test_show_flags_reference_cycles() {
    let tmp = setup_data_root();
    write_bom(tmp.path(), "BOM 200 Knob.csv", &["1,KNOB-001,Knob,1,,PA6", "2,100,Frame,1,,"]);
    bomdex(tmp.path()).arg("index").assert().success();

    bomdex(tmp.path())
        .args(["show", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[CYCLE DETECTED]"));

    bomdex(tmp.path())
        .args(["explode", "100"])
        .assert()
        .success()
        .stderr(predicate::str::contains("cycle detected"));
}

#[test]
fn test_documents_for_part_and_unlinked() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["docs", "--part", "15-00407", "--rev", "B"])
        .assert()
        .success()
        .stdout(predicate::str::contains("15-00407_B.pdf"))
        .stdout(predicate::str::contains("matched_part_and_revision"));

    bomdex(tmp.path())
        .arg("unlinked")
        .assert()
        .success()
        .stdout(predicate::str::contains("15-00407_A.pdf"))
        .stdout(predicate::str::contains("revision_mismatch"));

    bomdex(tmp.path())
        .args(["unlinked", "--reason", "bogus"])
        .assert()
        .failure();
}

#[test]
fn test_part_detail_and_type() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["part", "m4x10", "--set-type", "Fastener"])
        .assert()
        .success();

    let detail = json_output(bomdex(tmp.path()).args(["part", "M4X10", "-f", "json"]));
    assert_eq!(detail["part"]["part_type"], "fastener");
    assert_eq!(detail["usages"][0]["article_number"], "100");

    bomdex(tmp.path())
        .args(["part", "M4X10", "--set-type", "widget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid part type"));
}

#[test]
fn test_where_used() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["where-used", "KNOB-001", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("200,"));

    bomdex(tmp.path())
        .args(["where-used", "NOPE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No references found"));
}

// ============================================================================
// Explode Tests
// ============================================================================

#[test]
fn test_explode_multiplies_through_subassemblies() {
    let tmp = indexed_data_root();
    let order = json_output(bomdex(tmp.path()).args(["explode", "100", "--qty", "2", "-f", "json"]));
    let lines = order["lines"].as_array().unwrap();
    let qty = |part: &str| {
        lines
            .iter()
            .find(|l| l["part_number"] == part)
            .map(|l| l["qty_total"].as_f64().unwrap())
    };
    assert_eq!(qty("KNOB-001"), Some(6.0));
    assert_eq!(qty("M4X10"), Some(16.0));
    // 15-00407 only multiplies its children in children mode
    assert_eq!(qty("15-00407"), None);
    assert!(order["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn test_explode_selected_item() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["explode", "100", "--item", "2", "--mode", "selected", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("15-00407,B,Bracket,2"));

    bomdex(tmp.path())
        .args(["explode", "100", "--item", "9"])
        .assert()
        .failure();
}

#[test]
fn test_explode_export_writes_bundle() {
    let tmp = indexed_data_root();
    let out = tmp.path().join("orders");
    bomdex(tmp.path())
        .args(["explode", "100", "--mode", "full", "--export"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 line(s) and 1 document(s)"));

    let mut entries: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    assert_eq!(entries.len(), 2);
    let bundle = entries[0].clone();
    assert!(bundle.is_dir());
    assert!(bundle
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("BOMDEX_Order_"));
    assert_eq!(entries[1], bundle.with_extension("zip"));
    assert!(bundle.join("order_lines.xlsx").is_file());
    let csv = fs::read_to_string(bundle.join("order_lines.csv")).unwrap();
    assert!(csv.starts_with("Part NR,Rev,Description,Qty,Material,Finish"));
    assert!(csv.contains("15-00407,B,Bracket,2,S235,"));
    assert!(bundle.join("docs").join("15-00407_B.pdf").exists());
}

// ============================================================================
// Developer Mode
// ============================================================================

#[test]
fn test_suggest_revisions_requires_developer_mode() {
    let tmp = setup_data_root();
    fs::write(tmp.path().join("PDF").join("KNOB-001 spec.pdf"), b"%PDF").unwrap();
    bomdex(tmp.path()).arg("index").assert().success();

    bomdex(tmp.path())
        .args(["suggest-revisions", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("developer mode"));

    bomdex(tmp.path())
        .env("BOMDEX_DEVELOPER_MODE", "1")
        .args(["suggest-revisions", "200"])
        .assert()
        .success();

    bomdex(tmp.path())
        .args(["suggest-revisions", "200", "--developer", "-f", "json"])
        .assert()
        .success();
}

fn line_id(root: &Path, article: &str, part: &str) -> i64 {
    let lines = json_output(bomdex(root).args(["show", article, "--flat", "-f", "json"]));
    lines
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["part_number"] == part)
        .and_then(|l| l["line_id"].as_i64())
        .unwrap()
}

#[test]
fn test_edit_line_writes_back_and_reindexes() {
    let tmp = indexed_data_root();
    let id = line_id(tmp.path(), "100", "M4X10");

    bomdex(tmp.path())
        .args(["edit-line", &id.to_string(), "--set", "rev=C"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("developer mode"));

    bomdex(tmp.path())
        .args(["edit-line", &id.to_string(), "--set", "rev=C", "--set", "qty=6", "--developer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 cell(s) in 1 file(s)"));

    let content = fs::read_to_string(tmp.path().join("BOMS").join("BOM 100 Frame.csv")).unwrap();
    assert!(content.contains("2.1,M4X10,Screw,6,C,A2"), "{}", content);

    let lines = json_output(bomdex(tmp.path()).args(["show", "100", "--flat", "-f", "json"]));
    let screw = lines
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["part_number"] == "M4X10")
        .unwrap();
    assert_eq!(screw["revision"], "C");
    assert_eq!(screw["qty"].as_f64(), Some(6.0));
}

#[test]
fn test_edit_line_rejects_unknown_fields_and_lines() {
    let tmp = indexed_data_root();
    bomdex(tmp.path())
        .args(["edit-line", "1", "--set", "colour=red", "--developer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field"));

    bomdex(tmp.path())
        .args(["edit-line", "99999", "--set", "rev=C", "--developer"])
        .assert()
        .failure();
}

#[test]
fn test_suggest_revisions_apply() {
    let tmp = setup_data_root();
    fs::write(tmp.path().join("PDF").join("KNOB-001_C.pdf"), b"%PDF").unwrap();
    bomdex(tmp.path()).arg("index").assert().success();

    let summary = json_output(bomdex(tmp.path()).args([
        "suggest-revisions",
        "200",
        "--apply",
        "--developer",
        "-f",
        "json",
    ]));
    assert_eq!(summary["files_written"], 1);
    assert_eq!(summary["cells_written"], 1);

    let content = fs::read_to_string(tmp.path().join("BOMS").join("BOM 200 Knob.csv")).unwrap();
    assert!(content.contains("1,KNOB-001,Knob,1,C,PA6"), "{}", content);

    bomdex(tmp.path())
        .args(["docs", "--part", "KNOB-001", "--rev", "C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("matched_part_and_revision"));
}
