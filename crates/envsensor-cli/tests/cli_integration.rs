//! CLI integration tests.
//!
//! None of these reach a Bluetooth adapter: every case fails or finishes
//! before a device is opened.

use std::path::Path;
use std::process::{Command, Output};

fn run_envsensor(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_envsensor"))
        .args(args)
        .env_remove("ENVSENSOR_CONFIG")
        .env_remove("ENVSENSOR_DEVICE")
        .output()
        .expect("Failed to run envsensor binary")
}

fn write_config(dir: &Path, body: &str) -> String {
    let db = dir.join("envsensor.db");
    let content = format!("[storage]\npath = {:?}\n{}", db.display().to_string(), body);
    let path = dir.join("config.toml");
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_commands() {
    let output = run_envsensor(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["sync", "forward", "set-interval"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_version() {
    let output = run_envsensor(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("envsensor"));
}

#[test]
fn test_page_range_requires_addr() {
    let output = run_envsensor(&["sync", "--page-range", "0", "10"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--addr"));
}

#[test]
fn test_set_interval_out_of_range() {
    let output = run_envsensor(&["set-interval", "--addr", "C1:2A:3B:4C:5D:6E", "4000"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_config_reports_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[[devices]]
address = "not-a-mac"

[sync]
poll_attempts = 0
"#,
    );

    let output = run_envsensor(&["--config", &config, "sync"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("devices[0].address"), "{stderr}");
    assert!(stderr.contains("sync.poll_attempts"), "{stderr}");
    assert!(!dir.path().join("envsensor.db").exists());
}

#[test]
fn test_missing_config_file() {
    let output = run_envsensor(&["--config", "/nonexistent/envsensor.toml", "sync"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load configuration"));
}

#[test]
fn test_sync_without_devices() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_envsensor(&["--config", &config, "sync"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No devices to sync"));
}

#[test]
fn test_malformed_addr_flag() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_envsensor(&["--config", &config, "sync", "--addr", "C1:2A:3B"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("malformed address"));
}
