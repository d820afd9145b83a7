//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway data
//! directory and verify outputs.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "beepme-cli", "--"])
        .args(args)
        .env("BEEPME_DATA_DIR", data_dir)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn event_types(events: &Value) -> Vec<String> {
    events
        .as_array()
        .expect("events array")
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_status_on_fresh_install() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(status["active"], "inactive");
    assert!(status["current_beep_id"].is_null());
    assert!(status["next_wakeup"].is_null());
}

#[test]
fn test_start_stop_cycle() {
    let dir = tempfile::tempdir().unwrap();

    let events = run_json(dir.path(), &["scheduler", "start"]);
    let types = event_types(&events);
    assert!(types.contains(&"SchedulerActivated".to_string()));
    assert!(types.contains(&"BeepScheduled".to_string()));

    let status = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(status["active"], "active");
    assert!(status["current_beep_id"].is_number());
    assert!(status["next_wakeup"].is_string());

    // Second start is a no-op.
    let events = run_json(dir.path(), &["scheduler", "start"]);
    assert!(event_types(&events).is_empty());

    let events = run_json(dir.path(), &["scheduler", "stop"]);
    assert!(event_types(&events).contains(&"SchedulerDeactivated".to_string()));

    let status = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(status["active"], "inactive");
    assert!(status["next_wakeup"].is_null());
}

#[test]
fn test_tick_before_due_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    for (key, value) in [("timer.profile", "fixed"), ("timer.mean_secs", "3600")] {
        let (_, stderr, code) = run_cli(dir.path(), &["config", "set", key, value]);
        assert_eq!(code, 0, "config set {key} failed: {stderr}");
    }
    run_json(dir.path(), &["scheduler", "start"]);

    let events = run_json(dir.path(), &["scheduler", "tick"]);
    assert!(event_types(&events).is_empty());
}

#[test]
fn test_fire_and_accept() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["scheduler", "start"]);

    let events = run_json(dir.path(), &["scheduler", "fire"]);
    assert_eq!(event_types(&events), vec!["BeepFired".to_string()]);

    let events = run_json(dir.path(), &["scheduler", "accept"]);
    let types = event_types(&events);
    assert!(types.contains(&"BeepStatusChanged".to_string()));
    assert!(types.contains(&"BeepScheduled".to_string()));
    assert_eq!(events[0]["status"], "received");
}

#[test]
fn test_call_pauses_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["scheduler", "start"]);

    let events = run_json(dir.path(), &["call", "start"]);
    assert!(event_types(&events).contains(&"SchedulerPaused".to_string()));
    let status = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(status["active"], "inactive_after_call");
    assert_eq!(status["in_call"], true);

    let events = run_json(dir.path(), &["call", "end"]);
    assert!(event_types(&events).contains(&"SchedulerResumed".to_string()));
    let status = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(status["active"], "active");
}

#[test]
fn test_resume_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["scheduler", "start"]);
    run_json(dir.path(), &["scheduler", "resume"]);
    let first = run_json(dir.path(), &["scheduler", "status"]);
    run_json(dir.path(), &["scheduler", "resume"]);
    let second = run_json(dir.path(), &["scheduler", "status"]);
    assert_eq!(first, second);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "timer.profile"]);
    assert_eq!(code, 0, "Config get failed");
    assert_eq!(stdout.trim(), "exponential");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "timer.min_secs", "300"]);
    assert_eq!(code, 0, "Config set failed");
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "timer.min_secs"]);
    assert_eq!(stdout.trim(), "300");

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0, "Unknown key should fail");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.min_secs", "99999"]);
    assert_ne!(code, 0, "min above max should be rejected");
    assert!(stderr.contains("min_secs"));
}

#[test]
fn test_stats() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["scheduler", "start"]);
    run_json(dir.path(), &["scheduler", "stop"]);

    let today = run_json(dir.path(), &["stats", "today"]);
    assert_eq!(today["cancelled"], 1);

    let all = run_json(dir.path(), &["stats", "all"]);
    assert_eq!(all["total_beeps"], 1);

    let days = run_json(dir.path(), &["stats", "days"]);
    assert_eq!(days.as_array().unwrap().len(), 1);
}
