//! Integration tests for the command-line interface

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_anchor-patcher");

/// Helper to create a test workspace with one Go file and a batch file
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("main.go"),
        "package main\n\nfunc main() {\n\tprintln(\"hello\")\n}\n",
    )
    .unwrap();

    fs::write(
        dir.path().join("edits.json"),
        r#"{
  "edits": [
    {"type": "replace", "file": "main.go", "target": "println(\"hello\")", "replacement": "\tprintln(\"patched\")"},
    {"type": "insert", "file": "main.go", "target": "__EOF__", "content": "// end"}
  ]
}"#,
    )
    .unwrap();

    dir
}

fn run(workspace: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .env_remove("ANCHOR_PATCHER_WORKSPACE")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

#[test]
fn test_apply_help() {
    let output = Command::new(BIN).args(["apply", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--edits"));
    assert!(stdout.contains("--workspace"));
    assert!(stdout.contains("--no-validate"));
}

#[test]
fn test_apply_prints_result_json() {
    let dir = setup_test_workspace();
    let edits = dir.path().join("edits.json");

    let output = run(dir.path(), &["apply", "--edits", edits.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result, serde_json::json!({"success": true, "edits_applied": 2}));
    assert_eq!(
        fs::read_to_string(dir.path().join("main.go")).unwrap(),
        "package main\n\nfunc main() {\n\tprintln(\"patched\")\n}\n// end\n"
    );
}

#[test]
fn test_apply_reads_stdin() {
    let dir = setup_test_workspace();

    let mut child = Command::new(BIN)
        .args(["apply", "--edits", "-", "--workspace"])
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"edits": [{"type": "create_file", "file": "new.go", "content": "package main\n"}]}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("new.go")).unwrap(),
        "package main\n"
    );
}

#[test]
#[cfg(unix)]
fn test_apply_validator_failure_exits_nonzero() {
    let dir = setup_test_workspace();
    let edits = dir.path().join("edits.json");
    let before = fs::read_to_string(dir.path().join("main.go")).unwrap();

    let output = run(
        dir.path(),
        &["apply", "--edits", edits.to_str().unwrap(), "--validate", "false"],
    );

    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["edits_applied"], 0);
    assert!(result["error"].as_str().unwrap().contains("validator `false` failed"));
    assert_eq!(fs::read_to_string(dir.path().join("main.go")).unwrap(), before);
}

#[test]
fn test_apply_empty_batch_fails() {
    let dir = setup_test_workspace();
    let edits = dir.path().join("empty.json");
    fs::write(&edits, r#"{"edits": []}"#).unwrap();

    let output = run(dir.path(), &["apply", "--edits", edits.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["error"], "edits list must not be empty");
}

#[test]
fn test_apply_malformed_json_is_an_error() {
    let dir = setup_test_workspace();
    let edits = dir.path().join("bad.json");
    fs::write(&edits, "{not json").unwrap();

    let output = run(dir.path(), &["apply", "--edits", edits.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load edit batch"));
}

#[test]
fn test_preview_does_not_modify_files() {
    let dir = setup_test_workspace();
    let edits = dir.path().join("edits.json");
    let before = fs::read_to_string(dir.path().join("main.go")).unwrap();

    let output = run(dir.path(), &["preview", "--edits", edits.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("+\tprintln(\"patched\")"));
    assert!(stdout.contains("1 file(s) would change"));
    assert_eq!(fs::read_to_string(dir.path().join("main.go")).unwrap(), before);
}

#[test]
fn test_recover_restores_only_journaled_backups() {
    let dir = setup_test_workspace();
    let root = dir.path().canonicalize().unwrap();
    let original = "package main\n";

    // Leftovers of a batch that died after writing main.go and creating gen.go
    fs::write(root.join("main.go"), "half written").unwrap();
    fs::write(root.join("main.go.bak"), original).unwrap();
    fs::write(root.join("gen.go"), "package gen\n").unwrap();
    fs::write(root.join("notes.txt"), "current work").unwrap();
    fs::write(root.join("notes.txt.bak"), "user's old copy").unwrap();
    let journal = serde_json::json!({
        "suffix": ".bak",
        "entries": [
            {"file": root.join("main.go"), "digest": xxhash_rust::xxh3::xxh3_64(original.as_bytes())},
            {"file": root.join("gen.go"), "digest": null},
        ]
    });
    fs::write(root.join(".anchor-patcher.journal"), journal.to_string()).unwrap();

    let output = run(&root, &["recover"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Restored"));
    assert!(stdout.contains("Removed"));
    assert_eq!(fs::read_to_string(root.join("main.go")).unwrap(), original);
    assert!(!root.join("main.go.bak").exists());
    assert!(!root.join("gen.go").exists());
    assert!(!root.join(".anchor-patcher.journal").exists());
    assert_eq!(fs::read_to_string(root.join("notes.txt")).unwrap(), "current work");
    assert_eq!(
        fs::read_to_string(root.join("notes.txt.bak")).unwrap(),
        "user's old copy"
    );
}

#[test]
fn test_recover_without_journal_is_a_no_op() {
    let dir = setup_test_workspace();
    fs::write(dir.path().join("main.go.bak"), "stale").unwrap();

    let output = run(dir.path(), &["recover"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No interrupted batch found"));
    assert!(dir.path().join("main.go.bak").exists());
}
