#![cfg(unix)]

use std::time::Duration;

use keel_cloud::command::CommandError;
use keel_cloud::executor::{CommandExecutor, RealExecutor};
use tempfile::TempDir;

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_owned(), script.to_owned()]
}

#[tokio::test]
async fn exec_captures_stdout() {
    let out = RealExecutor.exec("sh", &sh("printf 'c0ffee\\n'")).await.unwrap();

    assert_eq!(out, "c0ffee\n");
}

#[tokio::test]
async fn exec_to_file_writes_stdout_to_disk() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("archive.tar");

    RealExecutor
        .exec_to_file("sh", &sh("printf 'tar-bytes'"), &output)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"tar-bytes");
}

#[tokio::test]
async fn exec_to_file_reports_stderr_on_failure() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("archive.tar");

    let result = RealExecutor
        .exec_to_file("sh", &sh("echo 'fatal: not a valid object name' >&2; exit 128"), &output)
        .await;

    match result {
        Err(CommandError::CommandFailed { stderr, .. }) => {
            assert!(stderr.contains("not a valid object name"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn exec_to_file_into_missing_directory_is_an_output_error() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("missing/archive.tar");

    let result = RealExecutor.exec_to_file("sh", &sh("true"), &output).await;

    assert!(matches!(result, Err(CommandError::Output { .. })));
}

#[tokio::test]
async fn dropped_exec_kills_the_child() {
    let tmp = TempDir::new().unwrap();
    let marker = tmp.path().join("finished");
    let script = format!("sleep 1; touch {}", marker.display());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), RealExecutor.exec("sh", &sh(&script)))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists());
}
