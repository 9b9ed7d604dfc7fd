//! Integration tests for the command-line interface.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "StartUp": {"action": "Click", "next": "Home"},
    "Home": {"recognition": "OCR"},
    "Unrelated": {}
}"#;

const INTERFACE: &str = r#"{
    "task": [
        {"name": "Daily", "entry": "StartUp", "check": true, "repeatable": true, "repeat_count": 2},
        {"name": "Weekly", "entry": "Unrelated"}
    ]
}"#;

fn setup_project(connected: bool) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("pipeline")).unwrap();
    fs::write(temp.path().join("pipeline/main.json"), CATALOG).unwrap();
    fs::write(temp.path().join("interface.json"), INTERFACE).unwrap();
    fs::write(
        temp.path().join("config.json"),
        format!(r#"{{"connection": {{"connected": {}}}}}"#, connected),
    )
    .unwrap();
    temp
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("screen-automation pipelines"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_plan_prints_checked_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["plan", "--root"]).arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Daily"))
        .stdout(predicate::str::contains("StartUp x2"))
        .stdout(predicate::str::contains("Unrelated").not());
    Ok(())
}

#[test]
fn cli_plan_piped_output_is_unstyled() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["plan", "--root"]).arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("◆ Daily (StartUp x2)"))
        .stdout(predicate::str::contains("\u{1b}[").not());
    Ok(())
}

#[test]
fn cli_plan_json_for_named_task() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let output = Command::new(cargo_bin("pipequeue"))
        .args(["plan", "--json", "--task", "Weekly", "--root"])
        .arg(temp.path())
        .output()?;
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(entries[0]["name"], "Weekly");
    assert_eq!(entries[0]["repeat"], 1);
    Ok(())
}

#[test]
fn cli_plan_unknown_task_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["plan", "--task", "Monthly", "--root"]).arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown task: Monthly"));
    Ok(())
}

#[test]
fn cli_eval_post_increment() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["eval", "{x++}", "--set", "x=5"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("5\n"))
        .stdout(predicate::str::contains("x = 6"));
    Ok(())
}

#[test]
fn cli_eval_division_by_zero_keeps_text() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["eval", "a {x/y} b", "--set", "x=4", "--set", "y=0"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("a {x/y} b\n"));
    Ok(())
}

#[test]
fn cli_run_completes() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["run", "--root"]).arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2 step(s) across 1 task(s)"));
    Ok(())
}

#[test]
fn cli_run_refuses_when_disconnected() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(false);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.args(["run", "--root"]).arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No emulator connected"));
    Ok(())
}

#[test]
fn cli_root_from_environment() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(true);
    let mut cmd = Command::new(cargo_bin("pipequeue"));
    cmd.env("PIPEQUEUE_ROOT", temp.path()).args(["plan"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Daily"));
    Ok(())
}
