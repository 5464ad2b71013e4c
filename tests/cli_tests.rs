//! Command-line behaviour of the `ist` binary
//!
//! Network-facing runs point a custom catalog at a local mock server so no
//! test depends on the public internet.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: [&str; 10] = [
    "TEST_MODE",
    "PROBE_DURATION",
    "IO_TIMEOUT",
    "CONNECT_TIMEOUT",
    "LATENCY_TIMEOUT",
    "RETAIN_PAYLOAD",
    "MAX_RETAINED_MB",
    "ENDPOINT_CATALOG",
    "USER_AGENT",
    "ENABLE_COLOR",
];

/// Command for the binary, isolated from the caller's environment and .env
fn create_test_cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ist").unwrap();
    cmd.current_dir(workdir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_catalog(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("catalog.json");
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_print_catalog_outputs_builtin_lists() {
    let dir = TempDir::new().unwrap();
    let output = create_test_cmd(&dir)
        .args(["--print-catalog", "--no-color"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let catalog: Value = serde_json::from_slice(&output.stdout).unwrap();
    for list in ["download", "upload", "latency"] {
        let entries = catalog[list].as_array().unwrap();
        assert!(!entries.is_empty(), "{} list is empty", list);
        assert!(entries[0]["url"].as_str().unwrap().starts_with("http"));
    }
}

#[test]
fn test_print_catalog_merges_partial_file() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        &dir,
        r#"{"latency": [{"url": "example.org", "label": "Example"}]}"#,
    );

    let output = create_test_cmd(&dir)
        .args(["--print-catalog", "--no-color", "--catalog", &catalog])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    let latency = parsed["latency"].as_array().unwrap();
    assert_eq!(latency.len(), 1);
    assert_eq!(latency[0]["url"], "http://example.org");
    assert!(!parsed["download"].as_array().unwrap().is_empty());
}

#[test]
fn test_zero_duration_is_rejected() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--duration", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duration must be greater than 0"));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot specify both --color and --no-color"));
}

#[test]
fn test_io_timeout_shorter_than_duration() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--duration", "20", "--io-timeout", "5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--io-timeout"));
}

#[test]
fn test_unreadable_catalog_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, "{ not json");

    create_test_cmd(&dir)
        .args(["--no-color", "--catalog", &catalog])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("catalog"));
}

#[test]
fn test_invalid_env_value_is_reported() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("PROBE_DURATION", "fast")
        .args(["--print-catalog", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("PROBE_DURATION"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_latency_json_against_mock_host() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        &dir,
        &format!(
            r#"{{"latency": [{{"url": "{}/ping", "label": "Local"}}]}}"#,
            server.uri()
        ),
    );

    let output = tokio::task::spawn_blocking(move || {
        let output = create_test_cmd(&dir)
            .args(["--mode", "latency", "--json", "--no-color", "--catalog", &catalog])
            .output()
            .unwrap();
        drop(dir);
        output
    })
    .await
    .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let run: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(run["mode"], "latency");
    assert_eq!(run["latency"]["success_count"], 1);
    assert_eq!(run["latency"]["total_count"], 1);
    assert_eq!(run["latency"]["results"][0]["host_label"], "Local");
    assert!(run.get("download").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_exhaustion_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        &dir,
        &format!(
            r#"{{"download": [
                {{"url": "{0}/a.iso", "label": "Missing A"}},
                {{"url": "{0}/b.iso", "label": "Missing B"}}
            ]}}"#,
            server.uri()
        ),
    );

    let output = tokio::task::spawn_blocking(move || {
        let output = create_test_cmd(&dir)
            .args(["--mode", "download", "--no-color", "--duration", "2", "--catalog", &catalog])
            .output()
            .unwrap();
        drop(dir);
        output
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(6));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("All 2 download endpoints failed"), "stderr: {}", stderr);
}
