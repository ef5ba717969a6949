use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

const DOC: &str = "C:\\Projects\\Sales.accdb";

fn write_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("host.json");
    let snapshot = json!({
        "application": "Access.Application",
        "document": DOC,
        "modules": [
            { "name": "Utils", "kind": "standard", "lines": ["Sub A()", "End Sub"] }
        ]
    });
    fs::write(&path, snapshot.to_string()).expect("write snapshot");
    path
}

fn vbactl(snapshot: &Path, audit: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vbactl").expect("binary exists");
    cmd.env_remove("VBACTL_APPLICATION")
        .env_remove("VBACTL_BACKUP_DIR")
        .env("VBACTL_AUDIT_LOG", audit)
        .arg("--snapshot")
        .arg(snapshot)
        .arg("--document")
        .arg(DOC);
    cmd
}

#[test]
fn help_displays_usage() {
    Command::cargo_bin("vbactl")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn add_proc_updates_snapshot_and_audit_log() {
    let temp = tempfile::tempdir().expect("tempdir");
    let snapshot = write_snapshot(temp.path());
    let audit = temp.path().join("audit.jsonl");

    vbactl(&snapshot, &audit)
        .args(["add-proc", "Utils"])
        .write_stdin("Function B() As Long\nB = 1\nEnd Function\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("added B to Utils at line 4"));

    vbactl(&snapshot, &audit)
        .args(["procedures", "Utils"])
        .assert()
        .success()
        .stdout(predicate::str::contains("function").and(predicate::str::contains("A ")));

    let saved = fs::read_to_string(&snapshot).expect("read snapshot");
    assert!(saved.contains("Function B() As Long"));

    let log = fs::read_to_string(&audit).expect("read audit log");
    assert!(log.lines().next().is_some_and(|line| line.contains("\"operation\":\"create\"")));
}

#[test]
fn document_mismatch_fails_with_message() {
    let temp = tempfile::tempdir().expect("tempdir");
    let snapshot = write_snapshot(temp.path());
    let before = fs::read_to_string(&snapshot).expect("read snapshot");

    Command::cargo_bin("vbactl")
        .expect("binary exists")
        .args(["--snapshot"])
        .arg(&snapshot)
        .args(["--document", "C:\\Other.accdb", "delete-proc", "Utils", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));

    assert_eq!(fs::read_to_string(&snapshot).expect("read snapshot"), before);
}

#[test]
fn completions_need_no_snapshot() {
    Command::cargo_bin("vbactl")
        .expect("binary exists")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vbactl"));
}
