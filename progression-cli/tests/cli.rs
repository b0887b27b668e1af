use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "progression-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn run(store: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_progression-cli"))
        .env("NO_COLOR", "1")
        .arg("--store")
        .arg(store)
        .args(args)
        .output()
        .expect("run cli")
}

fn write_facts(label: &str, json: &str) -> PathBuf {
    let path = temp_path(label).with_extension("json");
    std::fs::write(&path, json).expect("write facts");
    path
}

fn evaluate_json(store: &Path, facts: &Path, date: &str) -> serde_json::Value {
    let output = run(
        store,
        &[
            "evaluate",
            "--user",
            "investor-7",
            "--role",
            "investor",
            "--date",
            date,
            "--report",
            "json",
            "--facts",
            facts.to_str().expect("utf-8 path"),
        ],
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json report")
}

#[test]
fn evaluate_persists_and_acknowledge_clears_the_event() {
    let store = temp_path("store");
    let facts = write_facts(
        "facts",
        r#"{"has_avatar": true, "favorites_count": 2, "messages_sent_count": 1}"#,
    );

    let first = evaluate_json(&store, &facts, "2025-04-01");
    assert_eq!(first["total_points"], 35);
    assert_eq!(first["streak"], 1);
    assert_eq!(first["new_achievement"]["id"], "profile_photo");
    assert_eq!(first["pending_count"], 3);
    assert_eq!(first["persistence"]["status"], "saved");
    assert!(store.join("investor-7.json").exists());

    let ack = run(&store, &["acknowledge", "--user", "investor-7"]);
    assert!(ack.status.success());
    assert!(String::from_utf8_lossy(&ack.stdout).contains("Acknowledged 3"));

    let second = evaluate_json(&store, &facts, "2025-04-02");
    assert!(second["new_achievement"].is_null());
    assert_eq!(second["streak"], 2);
    assert_eq!(second["total_points"], 35);
}

#[test]
fn unavailable_facts_are_reported_not_fatal() {
    let store = temp_path("store-unavailable");
    let facts = write_facts(
        "facts-unavailable",
        r#"{"has_avatar": true, "favorites_count": 5, "unavailable": ["favorites_count"]}"#,
    );
    let report = evaluate_json(&store, &facts, "2025-04-01");
    assert_eq!(report["total_points"], 10);
    assert_eq!(report["unavailable_facts"][0]["fact"], "favorites_count");
}

#[test]
fn unknown_role_fails_loudly() {
    let store = temp_path("store-role");
    let output = run(&store, &["catalog", "--role", "landlord"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("landlord"));
}

#[test]
fn catalog_lists_role_entries() {
    let store = temp_path("store-catalog");
    let output = run(&store, &["catalog", "--role", "syndicator", "--report", "json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let ids: Vec<&str> = report["achievements"]
        .as_array()
        .expect("achievements")
        .iter()
        .filter_map(|entry| entry["id"].as_str())
        .collect();
    assert!(ids.contains(&"first_deal_published"));
    assert!(!ids.contains(&"first_investment"));
    assert_eq!(report["levels"].as_array().map(Vec::len), Some(5));
}

#[test]
fn simulate_writes_report_to_output_file() {
    let store = temp_path("store-sim");
    let output_path = temp_path("sim-report");
    let output = run(
        &store,
        &[
            "simulate",
            "--seeds",
            "3,11",
            "--days",
            "20",
            "--report",
            "json",
            "--output",
            output_path.to_str().expect("utf-8 path"),
        ],
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let content = std::fs::read_to_string(output_path).expect("read output");
    let runs: serde_json::Value = serde_json::from_str(&content).expect("json");
    assert_eq!(runs.as_array().map(Vec::len), Some(4));
    assert!(
        runs.as_array()
            .expect("runs")
            .iter()
            .all(|run| run["violations"].as_array().is_some_and(Vec::is_empty))
    );
}

#[test]
fn forget_removes_the_snapshot() {
    let store = temp_path("store-forget");
    let facts = write_facts("facts-forget", r#"{"has_avatar": true}"#);
    evaluate_json(&store, &facts, "2025-04-01");
    assert!(store.join("investor-7.json").exists());

    let output = run(&store, &["forget", "--user", "investor-7"]);
    assert!(output.status.success());
    assert!(!store.join("investor-7.json").exists());
}

#[test]
fn invalid_user_id_is_rejected_by_the_store() {
    let store = temp_path("store-invalid");
    let output = run(&store, &["forget", "--user", "../escape"]);
    assert!(!output.status.success());
}
