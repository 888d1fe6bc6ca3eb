use std::process::Command;
use std::{env, fs, path::PathBuf};

use tempfile::tempdir;

fn cli_bin_path() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_regcheck") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .expect("workspace root");
    let bin_name = if cfg!(windows) {
        "regcheck.exe"
    } else {
        "regcheck"
    };
    let fallback = workspace_root.join("target").join("debug").join(bin_name);
    assert!(
        fallback.exists(),
        "regcheck binary not found at {}",
        fallback.display()
    );
    fallback
}

fn run(root: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(cli_bin_path())
        .env_remove("RUST_LOG")
        .env("REGCHECK_EMBEDDER", "semantic-lite")
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("run regcheck")
}

#[test]
fn ingest_then_check_batch_emits_consolidated_report() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path().join("ws");
    let corpus = temp.path().join("nrc.json");
    fs::write(
        &corpus,
        r#"[
            {"regulation_text": "Reactor coolant pump seal replacement requires post-maintenance leak testing", "law type": "Maintenance"},
            {"regulation_text": "Valve stroke time testing after actuator maintenance"}
        ]"#,
    )
    .expect("write corpus");
    let actions = temp.path().join("actions.json");
    fs::write(
        &actions,
        r#"[
            {"id": "A1", "component": "Reactor coolant pump", "proposed_action": "Replace pump seal", "description": "Seal leakage"},
            {"id": "A2", "component": "Motor operated valve", "proposed_action": "Stroke time test", "description": "Actuator overhaul"}
        ]"#,
    )
    .expect("write actions");

    let output = run(&root, &["ingest", "--official", corpus.to_str().expect("corpus path")]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("ingest json");
    assert_eq!(report["total_inserted"], 2);
    assert_eq!(report["total_failure"], false);

    let output = run(&root, &["check", actions.to_str().expect("actions path")]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).expect("check json");
    let results = results.as_array().expect("array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["action_id"], "A1");
    let consolidated = results[0]["consolidated_report"].as_str().expect("report");
    assert!(consolidated.starts_with("Nuclear Maintenance Compliance Report (Consolidated)"));
    assert!(consolidated.contains("- ID: A1"));
    assert!(consolidated.contains("- ID: A2"));
    assert_eq!(results[1]["consolidated_report"], results[0]["consolidated_report"]);

    let output = run(&root, &["status"]);
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status json");
    assert_eq!(status["rule_count"], 2);
    assert_eq!(status["rules_by_source"]["official_guideline"], 2);
}

#[test]
fn check_against_empty_workspace_returns_no_matching_verdict() {
    let temp = tempdir().expect("tempdir");
    let action = temp.path().join("action.json");
    fs::write(
        &action,
        r#"{"id": "WO-1", "component": "Diesel generator", "proposed_action": "Replace fuel filter"}"#,
    )
    .expect("write action");

    let output = run(
        &temp.path().join("ws"),
        &["check", action.to_str().expect("action path")],
    );
    assert!(output.status.success());
    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(verdict["overall_compliant"], false);
    assert_eq!(verdict["report"]["compliance_status"], "NON-COMPLIANT");
    assert!(
        verdict["warning"]
            .as_str()
            .expect("warning")
            .starts_with("No matching regulations found")
    );
}

#[test]
fn failed_command_prints_error_payload_and_exits_non_zero() {
    let temp = tempdir().expect("tempdir");
    let output = run(
        &temp.path().join("ws"),
        &["ingest", "--official", temp.path().join("missing.json").to_str().expect("path")],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"code\""), "stderr: {stderr}");
    assert!(stderr.contains("\"trace_id\""), "stderr: {stderr}");
}
