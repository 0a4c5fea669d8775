//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "daykeys-cli", "--"])
        .args(args)
        .env("DAYKEYS_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_parse_block_json() {
    let (stdout, _, code) = run_cli(&["parse", "b 9am 30m standup", "--json"]);
    assert_eq!(code, 0, "parse failed");
    let json = parse_json(&stdout);
    assert_eq!(json["type"], "block");
    assert_eq!(json["startTime"], "09:00");
    assert_eq!(json["duration"], 30);
    assert_eq!(json["title"], "standup");
    assert_eq!(json["executable"], true);
}

#[test]
fn test_parse_human_output() {
    let (stdout, _, code) = run_cli(&["parse", "t write report", "--context", "task"]);
    assert_eq!(code, 0, "parse failed");
    assert!(stdout.contains("task [ready]"));
    assert!(stdout.contains("title=write report"));
}

#[test]
fn test_parse_rejected_by_context() {
    let (_, stderr, code) = run_cli(&["parse", "b 9am", "--context", "task"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no match"));
}

#[test]
fn test_suggest_json() {
    let (stdout, _, code) = run_cli(&["suggest", "b", "--json"]);
    assert_eq!(code, 0, "suggest failed");
    let json = parse_json(&stdout);
    let items = json.as_array().expect("array output");
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item["type"] == "block"));
}

#[test]
fn test_keys_chord_and_apply() {
    let (stdout, _, code) = run_cli(&[
        "keys", "j", "j", "enter", "--apply", "--blocks", "5", "--date", "2024-03-04", "--json",
    ]);
    assert_eq!(code, 0, "keys failed");
    let json = parse_json(&stdout);
    let outcomes = json.as_array().expect("array output");
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["command"], "next-block");
    assert_eq!(outcomes[1]["context"], "BLOCK_LEVEL");
    assert_eq!(outcomes[2]["command"], "enter-task");
    assert_eq!(outcomes[2]["context"], "TASK_LEVEL");
}

#[test]
fn test_keys_pending_chord() {
    let (stdout, _, code) = run_cli(&["keys", "g", "--json"]);
    assert_eq!(code, 0, "keys failed");
    let json = parse_json(&stdout);
    assert_eq!(json[0]["outcome"], "pending");
    assert_eq!(json[0]["pending"][0], "g");
}

#[test]
fn test_commands_list() {
    let (stdout, _, code) = run_cli(&["commands", "--context", "task", "--json"]);
    assert_eq!(code, 0, "commands failed");
    let json = parse_json(&stdout);
    let ids: Vec<_> = json
        .as_array()
        .expect("array output")
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert!(ids.contains(&"toggle-task"));
    assert!(ids.contains(&"show-help"));
}

#[test]
fn test_stats() {
    let (stdout, _, code) = run_cli(&["stats"]);
    assert_eq!(code, 0, "stats failed");
    let json = parse_json(&stdout);
    assert!(json["totalCommands"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn test_config_get_unknown_key() {
    let (_, stderr, code) = run_cli(&["config", "get", "dispatch.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_list() {
    let (stdout, _, code) = run_cli(&["config", "list"]);
    assert_eq!(code, 0, "config list failed");
    assert!(stdout.contains("[dispatch]"));
}
