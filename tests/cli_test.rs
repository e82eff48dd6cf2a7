#[path = "../src/test_support.rs"]
mod test_support;

use anyhow::Result;
use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use test_support::{fit_file_at, write_zip};

fn fitbatch() -> Command {
    let mut cmd = Command::cargo_bin("fitbatch").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn populate(input: &Path) -> Result<()> {
    fs::create_dir_all(input)?;
    for day in 1..=5 {
        let ts = Utc.with_ymd_and_hms(2013, 3, day, 8, 0, 0).unwrap();
        fs::write(input.join(format!("old_{day}.fit")), fit_file_at(&[ts]))?;
    }

    let recent = Utc.with_ymd_and_hms(2016, 7, 4, 8, 0, 0).unwrap();
    write_zip(
        &input.join("recent.zip"),
        &[("recent.fit", fit_file_at(&[recent]).as_slice())],
    )?;
    Ok(())
}

#[test]
fn test_help_lists_flags() {
    fitbatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input-folder"))
        .stdout(predicate::str::contains("--cutoff-date"))
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_batches_old_files() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    let csv = temp.path().join("times.csv");
    populate(&input)?;

    fitbatch()
        .args(["--input-folder", input.to_str().unwrap()])
        .args(["--output-csv", csv.to_str().unwrap()])
        .args(["--output-folder", output.to_str().unwrap()])
        .args(["--cutoff-date", "2014-01-13", "--batch-size", "2"])
        .args(["--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Files processed: 6"))
        .stdout(predicate::str::contains("Files filtered: 5"))
        .stdout(predicate::str::contains("Batches: 3"));

    assert!(output.join("batch_001/old_1.fit").exists());
    assert!(output.join("batch_003/old_5.fit").exists());
    assert!(!output.join("batch_004").exists());

    let content = fs::read_to_string(&csv)?;
    assert_eq!(content.lines().count(), 7);
    assert!(content.contains("recent.zip/recent.fit,2016-07-04T08:00:00Z"));
    Ok(())
}

#[test]
fn test_after_policy_json_output() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    populate(&input)?;

    let assert = fitbatch()
        .args(["--input-folder", input.to_str().unwrap()])
        .args(["--output-csv", temp.path().join("t.csv").to_str().unwrap()])
        .args(["--output-folder", output.to_str().unwrap()])
        .args(["--cutoff-date", "2014-01-13", "--policy", "after"])
        .args(["--output-format", "json"])
        .assert()
        .success();

    // Progress messages go to stderr, leaving one JSON document on stdout
    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(report["counts"]["selected"], 1);
    assert_eq!(report["policy"], "after");

    assert!(output.join("batch_001/recent.fit").exists());
    Ok(())
}

#[test]
fn test_invalid_cutoff_date_exits_with_one() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in");
    populate(&input)?;

    fitbatch()
        .args(["--input-folder", input.to_str().unwrap()])
        .args(["--output-csv", temp.path().join("t.csv").to_str().unwrap()])
        .args(["--output-folder", temp.path().join("out").to_str().unwrap()])
        .args(["--cutoff-date", "2014/01/13"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid cutoff date"));

    assert!(!temp.path().join("t.csv").exists());
    Ok(())
}

#[test]
fn test_missing_input_folder_exits_with_one() -> Result<()> {
    let temp = TempDir::new()?;

    fitbatch()
        .args(["--input-folder", temp.path().join("nope").to_str().unwrap()])
        .args(["--output-csv", temp.path().join("t.csv").to_str().unwrap()])
        .args(["--output-folder", temp.path().join("out").to_str().unwrap()])
        .args(["--cutoff-date", "2014-01-13"])
        .assert()
        .code(1);

    assert!(!temp.path().join("out").exists());
    Ok(())
}

#[test]
fn test_zero_batch_size_exits_with_one() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in");
    populate(&input)?;

    fitbatch()
        .args(["--input-folder", input.to_str().unwrap()])
        .args(["--output-csv", temp.path().join("t.csv").to_str().unwrap()])
        .args(["--output-folder", temp.path().join("out").to_str().unwrap()])
        .args(["--cutoff-date", "2014-01-13", "--batch-size", "0"])
        .assert()
        .code(1);
    Ok(())
}

#[test]
fn test_dry_run_prints_plan() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    populate(&input)?;

    fitbatch()
        .args(["--input-folder", input.to_str().unwrap()])
        .args(["--output-csv", temp.path().join("t.csv").to_str().unwrap()])
        .args(["--output-folder", output.to_str().unwrap()])
        .args(["--cutoff-date", "2014-01-13", "--batch-size", "4", "--dry-run"])
        .args(["--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("batch_001 (4 files)"))
        .stdout(predicate::str::contains("batch_002 (1 files)"));

    assert!(!output.exists());
    assert!(!temp.path().join("t.csv").exists());
    Ok(())
}

#[test]
fn test_generate_config() -> Result<()> {
    let temp = TempDir::new()?;
    let config_path = temp.path().join("fitbatch.toml");

    fitbatch()
        .args(["--generate-config", "--config", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(&config_path)?;
    assert!(content.contains("[filter]"));
    assert!(content.contains("policy = \"before\""));
    Ok(())
}
