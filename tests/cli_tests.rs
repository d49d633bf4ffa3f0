//! Command-line behaviour of the `consolebox` binary.

use std::path::Path;
use std::process::{Command, Output};

fn consolebox(work_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_consolebox"))
        .args(args)
        .env("CONSOLEBOX_WORK_DIR", work_dir)
        .env("CONSOLEBOX_POLL_INTERVAL_MS", "5")
        .env("LOG_LEVEL", "error")
        .output()
        .unwrap()
}

fn write_program(dir: &Path, source: &str) -> String {
    let path = dir.join("program.cb");
    std::fs::write(&path, source).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_run_prints_captured_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_program(
        dir.path(),
        "using static System.Console;\nfunction main() { WriteLine(\"Hi\"); }",
    );

    let output = consolebox(dir.path(), &["run", "-f", &file, "-n", "2"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hi\nHi\n");
}

#[test]
fn test_run_reports_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_program(dir.path(), "function main() { while (true) { } }");

    let output = consolebox(dir.path(), &["run", "-f", &file, "--timeout", "200", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["kind"], "timeout");
}

#[test]
fn test_check_reports_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_program(dir.path(), "function main() {\n let x = ;\n}");

    let output = consolebox(dir.path(), &["check", "-f", &file]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("CB1002 | "), "{}", stdout);
}

#[test]
fn test_complete_lists_console_members() {
    let dir = tempfile::tempdir().unwrap();
    let source = "function main() { System.Console. }";
    let file = write_program(dir.path(), source);
    let offset = (source.find(". }").unwrap() + 1).to_string();

    let output = consolebox(dir.path(), &["complete", "-f", &file, "--offset", &offset]);
    assert!(output.status.success());
    let items: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(items.iter().any(|item| item["label"] == "WriteLine"));
}

#[test]
fn test_complete_offset_counts_characters() {
    let dir = tempfile::tempdir().unwrap();
    let source = "function main() { let café = 1; System.Console. }";
    let file = write_program(dir.path(), source);
    let prefix = &source[..source.find(". }").unwrap() + 1];
    let offset = prefix.chars().count().to_string();
    assert_ne!(offset, prefix.len().to_string());

    let output = consolebox(dir.path(), &["complete", "-f", &file, "--offset", &offset]);
    assert!(output.status.success());
    let items: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(items.iter().any(|item| item["label"] == "WriteLine"));

    let past_end = (source.chars().count() + 1).to_string();
    let output = consolebox(dir.path(), &["complete", "-f", &file, "--offset", &past_end]);
    assert_eq!(output.status.code(), Some(2));
}
