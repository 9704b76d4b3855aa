//! CLI integration tests
//!
//! These tests verify that the binary wires flags, output formats and exit
//! codes together correctly.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn reclaim() -> Command {
    let mut cmd = Command::cargo_bin("reclaim").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, text) in files {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, text).unwrap();
    }
    dir
}

fn dead_file_project() -> TempDir {
    project(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")])
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_cli_help() {
    reclaim()
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--similarity-threshold"))
        .stdout(predicate::str::contains("--verify-command"))
        .stdout(predicate::str::contains("--prior"));
}

#[test]
fn test_cli_version() {
    reclaim()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reclaim"));
}

#[test]
fn test_cli_terminal_summary() {
    let dir = dead_file_project();
    reclaim()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Files: 2 scanned"))
        .stdout(predicate::str::contains("remove old.py"));
}

#[test]
fn test_cli_json_to_stdout() {
    let dir = dead_file_project();
    let output = reclaim()
        .args(["scan", "--format", "json", "--quiet"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["version"], "1.0");
    assert_eq!(report["run"]["complete"], true);
    assert_eq!(report["actions"][0]["kind"], "remove");
    assert_eq!(report["groups"][0]["status"], "pending");
}

#[test]
fn test_cli_yaml_output_file_and_prior() {
    let dir = dead_file_project();
    let out = TempDir::new().unwrap();
    let report = out.path().join("plan.yaml");

    reclaim()
        .args(["scan", "--format", "yaml", "--output"])
        .arg(&report)
        .arg(dir.path())
        .assert()
        .success();
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("kind: remove"));

    let output = reclaim()
        .args(["scan", "--format", "json", "--quiet", "--prior"])
        .arg(&report)
        .arg(dir.path())
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["run"]["unchanged_since_prior"], true);
}

#[test]
fn test_cli_flags_override_config() {
    let dir = project(&[
        ("main.py", "print(1)\n"),
        ("old.py", "x = 1\n"),
        (".reclaim.yml", "duplicates:\n  similarity_threshold: 0.9\n"),
    ]);
    let output = reclaim()
        .args(["scan", "--format", "json", "--quiet", "--shingle-size", "3", "--entry", "old.py"])
        .arg(dir.path())
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["run"]["similarity_threshold"], 0.9);
    assert_eq!(json["run"]["shingle_size"], 3);
    // "old.py" has no '/' so it names a symbol, not a file; the file stays dead
    assert_eq!(json["actions"][0]["subject"]["path"], "old.py");
}

#[test]
fn test_cli_entry_glob_keeps_file() {
    let dir = dead_file_project();
    let output = reclaim()
        .args(["scan", "--format", "json", "--quiet", "--entry", "**/old.py"])
        .arg(dir.path())
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["actions"].as_array().unwrap().len(), 0);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_cli_invalid_threshold() {
    let dir = dead_file_project();
    reclaim()
        .args(["scan", "--similarity-threshold", "1.5"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("similarity_threshold"));
}

#[test]
fn test_cli_missing_config_file_exits_2() {
    let dir = dead_file_project();
    reclaim()
        .args(["scan", "--config"])
        .arg(dir.path().join("nope.yml"))
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_missing_root_exits_2() {
    let dir = TempDir::new().unwrap();
    reclaim()
        .args(["scan", "--format", "json", "--quiet"])
        .arg(dir.path().join("nope"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"complete\": false"));
}

#[test]
fn test_cli_corrupt_prior_still_prints_plan() {
    let dir = dead_file_project();
    let out = TempDir::new().unwrap();
    let prior = out.path().join("prior.json");
    std::fs::write(&prior, "{ not a report").unwrap();

    let output = reclaim()
        .args(["scan", "--format", "json", "--quiet", "--prior"])
        .arg(&prior)
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["run"]["complete"], false);
    assert_eq!(json["actions"][0]["subject"]["path"], "old.py");
}

#[test]
fn test_cli_interactive_requires_apply() {
    let dir = dead_file_project();
    reclaim()
        .args(["scan", "--interactive"])
        .arg(dir.path())
        .assert()
        .failure();
}

// ============================================================================
// Apply Tests
// ============================================================================

#[cfg(unix)]
#[test]
fn test_cli_apply_with_verify_and_undo_script() {
    let dir = dead_file_project();
    let out = TempDir::new().unwrap();
    let script = out.path().join("undo.sh");

    reclaim()
        .args(["scan", "--apply", "--verify-command", "true", "--undo-script"])
        .arg(&script)
        .arg(dir.path())
        .assert()
        .code(0);
    assert!(!dir.path().join("old.py").exists());

    std::process::Command::new("sh").arg(&script).status().unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("old.py")).unwrap(), "x = 1\n");
}

#[test]
fn test_cli_apply_without_verify_command_changes_nothing() {
    let dir = dead_file_project();
    reclaim()
        .args(["scan", "--apply"])
        .arg(dir.path())
        .assert()
        .code(1);
    assert!(dir.path().join("old.py").exists());
}
