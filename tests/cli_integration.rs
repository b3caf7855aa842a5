//! Smoke tests for the `repeater` binary
//!
//! Each test points `--storage-path` into its own temp directory and uses
//! an empty config file so the environment cannot leak in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

mod common;

fn repeater(config: &Path, storage: &Path) -> Command {
    let mut cmd = Command::cargo_bin("repeater").unwrap();
    cmd.env_remove("REPEATER_STORAGE_PATH")
        .env_remove("REPEATER_COOKIE_JAR")
        .env_remove("REPEATER_MAX_CHAIN_DEPTH")
        .arg("--config")
        .arg(config)
        .arg("--storage-path")
        .arg(storage);
    cmd
}

#[test]
fn test_add_then_list_json() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();
    let db = data.path().join("repeater.db");

    repeater(&config, &db)
        .arg("add")
        .arg("curl 'https://example.com/api/items?page=2' -H 'Accept: application/json'")
        .arg("--name")
        .arg("items")
        .assert()
        .success()
        .stdout(predicate::str::contains("items"));

    let output = repeater(&config, &db)
        .arg("list")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let requests: Value = serde_json::from_slice(&output.stdout).unwrap();
    let requests = requests.as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["name"], "items");
    assert_eq!(requests[0]["urlPattern"], "https://example.com/api/items");
}

#[test]
fn test_match_filters_by_pattern() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();
    let db = data.path().join("repeater.db");

    repeater(&config, &db)
        .args(["add", "curl https://shop.example.com/cart", "-n", "cart"])
        .args(["--pattern", "https://shop.example.com/*"])
        .assert()
        .success();
    repeater(&config, &db)
        .args(["add", "curl https://other.example.org/", "-n", "other"])
        .assert()
        .success();

    let output = repeater(&config, &db)
        .args(["match", "https://shop.example.com/checkout?step=1", "--json"])
        .output()
        .unwrap();
    let matched: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = matched
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, vec!["cart"]);
}

#[test]
fn test_add_rejects_non_curl_command() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();

    repeater(&config, &data.path().join("repeater.db"))
        .args(["add", "wget https://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must start with"));
}

#[test]
fn test_delete_unknown_request_fails() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();

    repeater(&config, &data.path().join("repeater.db"))
        .args(["delete", "no-such-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request not found"));
}

#[test]
fn test_cron_next_prints_requested_count() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();

    let output = repeater(&config, &data.path().join("repeater.db"))
        .args(["cron-next", "30 6 * * *", "--count", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|line| line.contains("06:30")));
}

#[test]
fn test_cron_next_rejects_bad_expression() {
    let (_cfg_dir, config) = common::temp_config_file("{}\n");
    let data = TempDir::new().unwrap();

    repeater(&config, &data.path().join("repeater.db"))
        .args(["cron-next", "* * *"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 5 fields"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_cfg_dir, config) = common::temp_config_file("executor:\n  max_chain_depth: 500\n");
    let data = TempDir::new().unwrap();

    repeater(&config, &data.path().join("repeater.db"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_chain_depth"));
}

#[test]
fn test_missing_config_warns_and_uses_defaults() {
    let cfg_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    repeater(
        &cfg_dir.path().join("absent.yaml"),
        &data.path().join("repeater.db"),
    )
    .env_remove("RUST_LOG")
    .arg("list")
    .assert()
    .success()
    .stderr(predicate::str::contains("Config file not found"));
}
