use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
#[allow(deprecated)]
fn test_render_api_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("message.md");
    fs::write(&path, "hello **bold** world\n").unwrap();

    let mut cmd = Command::cargo_bin("md-tom").unwrap();
    cmd.arg("render").arg(&path);

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["text"], "hello bold world");
    let entity = &json["entities"][0];
    assert_eq!(entity["type"], "MessageEntityBold");
    assert_eq!(entity["offset"], 6);
    assert_eq!(entity["length"], 4);
}

#[test]
#[allow(deprecated)]
fn test_render_html() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("message.md");
    fs::write(&path, ">quote").unwrap();

    let mut cmd = Command::cargo_bin("md-tom").unwrap();
    cmd.arg("render").arg("--format").arg("html").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("<blockquote data-id="))
        .stdout(predicate::str::contains("data-type=\"blockquote\""));
}

#[test]
#[allow(deprecated)]
fn test_render_markdown_from_stdin() {
    let mut cmd = assert_cmd::Command::cargo_bin("md-tom").unwrap();
    cmd.arg("render").arg("--format").arg("markdown");
    cmd.write_stdin("```rs\nfn main() {}\n```\n");

    cmd.assert()
        .success()
        .stdout(predicate::eq("```rs\nfn main() {}\n```\n"));
}

#[test]
#[allow(deprecated)]
fn test_missing_file_fails() {
    let dir = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("md-tom").unwrap();
    cmd.arg("render").arg(dir.path().join("absent.md"));

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
#[allow(deprecated)]
fn test_unknown_format_rejected() {
    let mut cmd = Command::cargo_bin("md-tom").unwrap();
    cmd.arg("render").arg("--format").arg("pdf");

    cmd.assert().failure();
}
