//! Integration tests for CLI commands.
//!
//! `run` is exercised against the simulated store; nothing here needs real
//! store binaries.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn skipgate(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skipgate").unwrap();
    cmd.args(["--no-color", "--project", project.path().to_str().unwrap()]);
    cmd
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn simulated_run_passes_builtin_matrix() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .args(["run", "--simulate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("three_six"))
        .stdout(predicate::str::contains("four_zero"))
        .stdout(predicate::str::contains("four_two"))
        .stdout(predicate::str::contains("3 release(s) refused"));

    // Reset after the last spec
    let data_dir = temp.path().join(".skipgate/data/skip_level_upgrade");
    assert!(data_dir.is_dir());
    assert_eq!(fs::read_dir(&data_dir).unwrap().count(), 0);
}

#[test]
fn simulated_run_with_only_filter() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .args(["run", "--simulate", "--only", "4.0", "--fingerprint", "enforce"])
        .assert()
        .success()
        .stdout(predicate::str::contains("four_zero"))
        .stdout(predicate::str::contains("three_six").not())
        .stdout(predicate::str::contains("1 release(s) refused"));
}

#[test]
fn only_filter_with_no_match_fails() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .args(["run", "--simulate", "--only", "4.4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matrix entries match"));
}

#[test]
fn matrix_entry_at_last_lts_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("skipgate.toml"),
        r#"
[[matrix]]
binary_version = "4.4"
test_collection = "four_four"
"#,
    )
    .unwrap();

    skipgate(&temp)
        .args(["run", "--simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not older than last-lts"));
}

#[test]
fn missing_historical_binary_is_environment_fault() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("skipgate.toml"),
        r#"
[paths]
multiversion_dir = "no-such-dir"
latest_binary = "no-such-dir/mongod"
"#,
    )
    .unwrap();

    skipgate(&temp)
        .args(["run", "--only", "3.6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment-fault"));
}

// ============================================================================
// Matrix
// ============================================================================

#[test]
fn matrix_lists_builtin_entries() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .arg("matrix")
        .assert()
        .success()
        .stdout(predicate::str::contains("test.three_six"))
        .stdout(predicate::str::contains("test.four_zero"))
        .stdout(predicate::str::contains("test.four_two"))
        .stdout(predicate::str::contains("older than last-lts 4.4"));
}

#[test]
fn matrix_uses_configured_entries() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("skipgate.toml"),
        r#"
[[matrix]]
binary_version = "3.4"
test_collection = "three_four"
"#,
    )
    .unwrap();

    skipgate(&temp)
        .arg("matrix")
        .assert()
        .success()
        .stdout(predicate::str::contains("three_four"))
        .stdout(predicate::str::contains("four_zero").not());
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_show_text() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Last LTS"))
        .stdout(predicate::str::contains("skip_level_upgrade"));
}

#[test]
fn config_show_toml_reflects_project_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("skipgate.toml"),
        "[protocol]\nfingerprint = \"enforce\"\n",
    )
    .unwrap();

    skipgate(&temp)
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fingerprint = \"enforce\""));
}

#[test]
fn config_show_json() {
    let temp = TempDir::new().unwrap();

    skipgate(&temp)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"last_lts\": \"4.4\""));
}
