#![allow(clippy::unwrap_used)]

mod common;

use common::{Workspace, batchkeep_cmd, today_folder};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

#[test]
fn new_creates_first_batch() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("new")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created batch 1"))
        .stdout(predicate::str::contains("no previous batch"));

    let folder = ws.staging().join(today_folder(1));
    assert!(folder.join("visited_articles.txt").is_file());
    assert!(folder.join("failed_articles.txt").is_file());
    assert!(folder.join("batch_1_scraping_results_1.jsonl").is_file());
}

#[test]
fn new_from_previous_folder_seeds_ledgers() -> anyhow::Result<()> {
    let ws = Workspace::new();
    let previous = ws.staging().join("20240101_batch_3");
    fs::create_dir_all(&previous)?;
    fs::write(previous.join("visited_articles.txt"), "Amsterdam\nRotterdam\n")?;

    let out = ws
        .cmd()
        .args(["new", "--previous"])
        .arg(&previous)
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: Value = serde_json::from_slice(&out)?;
    assert_eq!(v["batchNumber"], 4);
    assert_eq!(v["visitedCount"], 2);
    assert_eq!(v["failedCount"], 0);
    assert!(
        v["folder"]
            .as_str()
            .unwrap()
            .ends_with(&today_folder(4))
    );
    Ok(())
}

#[test]
fn new_rejects_malformed_previous_folder() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["new", "--previous"])
        .arg(ws.staging().join("20240101_run_3"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("_batch_"));
}

#[test]
fn new_without_data_root_fails() {
    let ws = Workspace::new();

    batchkeep_cmd()
        .env("BATCHKEEP_CONFIG", ws.root().join("config.toml"))
        .arg("new")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No data root"));
}
