//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return output.
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_pausas"))
        .args(args)
        .env("PAUSAS_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_timer_lifecycle() {
    let dir = tempfile::tempdir().unwrap();

    let idle = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(idle["mode"], "idle");
    assert_eq!(idle["workSecondsRemaining"], 7200);
    assert_eq!(idle["formattedTime"], "2:00:00");

    let started = run_json(dir.path(), &["timer", "start"]);
    assert_eq!(started["mode"], "working");
    assert_eq!(started["currentCycleNumber"], 1);

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["mode"], "working");
    assert!(status["workSecondsRemaining"].as_u64().unwrap() <= 7200);

    let paused = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(paused["mode"], "paused");

    let resumed = run_json(dir.path(), &["timer", "resume"]);
    assert_eq!(resumed["mode"], "working");
    assert_eq!(resumed["currentCycleNumber"], 1);

    let reset = run_json(dir.path(), &["timer", "reset"]);
    assert_eq!(reset["mode"], "idle");
    assert_eq!(reset["currentCycleNumber"], 0);
}

#[test]
fn test_timer_state_is_per_user() {
    let dir = tempfile::tempdir().unwrap();

    let started = run_json(dir.path(), &["--user", "ana", "timer", "start"]);
    assert_eq!(started["mode"], "working");

    let other = run_json(dir.path(), &["--user", "ben", "timer", "status"]);
    assert_eq!(other["mode"], "idle");

    let anonymous = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(anonymous["mode"], "idle");

    let same = run_json(dir.path(), &["timer", "status", "--user", "ana"]);
    assert_eq!(same["mode"], "working");
}

#[test]
fn test_config_list_and_set() {
    let dir = tempfile::tempdir().unwrap();

    let settings = run_json(dir.path(), &["config", "list"]);
    assert_eq!(settings["work_interval_minutes"], 120.0);
    assert_eq!(settings["auto_start_next_cycle"], true);

    // Snaps to the nearest allowed interval.
    let (code, stdout, _) = run_cli(dir.path(), &["config", "set", "work_interval_minutes", "170"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "180.0");

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "work_interval_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "180.0");

    let idle = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(idle["workSecondsRemaining"], 10800);
}

#[test]
fn test_config_get_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "no_such_key"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_exercises_list() {
    let dir = tempfile::tempdir().unwrap();

    let all = run_json(dir.path(), &["exercises", "list", "--json"]);
    assert_eq!(all.as_array().unwrap().len(), 20);

    let visual = run_json(dir.path(), &["exercises", "list", "--json", "--category", "visual"]);
    let visual = visual.as_array().unwrap();
    assert_eq!(visual.len(), 5);
    assert!(visual.iter().all(|e| e["category"] == "visual"));

    let (code, stdout, _) = run_cli(dir.path(), &["exercises", "list"]);
    assert_eq!(code, 0);
    assert!(!stdout.is_empty());

    let (code, _, stderr) = run_cli(dir.path(), &["exercises", "list", "--category", "legs"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown category"));
}

#[test]
fn test_history_reports() {
    let dir = tempfile::tempdir().unwrap();

    let today = run_json(dir.path(), &["history", "today"]);
    assert_eq!(today["sessions"].as_array().unwrap().len(), 0);
    assert_eq!(today["record"]["sessionsExpected"], 4);

    let expected = run_json(dir.path(), &["history", "expect", "3"]);
    assert_eq!(expected["sessionsExpected"], 3);

    let stats = run_json(dir.path(), &["history", "stats", "--days", "7"]);
    assert!(stats.get("averageCompliance").is_some());
    assert!(stats.get("currentStreak").is_some());

    let week = run_json(dir.path(), &["history", "week"]);
    assert!(week.is_array());
}

#[test]
fn test_history_is_per_user() {
    let dir = tempfile::tempdir().unwrap();

    let ana = run_json(dir.path(), &["--user", "ana", "history", "expect", "2"]);
    assert_eq!(ana["sessionsExpected"], 2);

    let ben = run_json(dir.path(), &["--user", "ben", "history", "today"]);
    assert_eq!(ben["record"]["sessionsExpected"], 4);

    let anonymous = run_json(dir.path(), &["history", "today"]);
    assert_eq!(anonymous["record"]["sessionsExpected"], 4);

    let again = run_json(dir.path(), &["history", "today", "--user", "ana"]);
    assert_eq!(again["record"]["sessionsExpected"], 2);
}
