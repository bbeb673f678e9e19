use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("nodelet.yaml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_command() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_version_flag() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodelet"));
}

#[test]
fn test_version_command_lists_runtimes() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("runp"))
        .stdout(predicate::str::contains("runc"))
        .stdout(predicate::str::contains("runk"));
}

#[test]
fn test_invalid_command() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_start_requires_config() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_validate_process_runtime() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "namespace: alice\nprovider:\n  runtime: runp\ncapacity:\n  cpu: \"4\"\n",
    );

    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime:        runp"))
        .stdout(predicate::str::contains("cpu=4 memory=auto"))
        .stdout(predicate::str::contains("create nodelet.apps"))
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_validate_delegated_runtime() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "provider:\n  runtime: runk\n  k8s:\n    namespace: workloads\n",
    );

    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("namespace=workloads credentials=in-cluster"));
}

#[test]
fn test_validate_unknown_runtime_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "provider:\n  runtime: runx\n");

    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown runtime: runx"));
}

#[test]
fn test_validate_missing_file_fails() {
    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/nodelet.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_start_unknown_runtime_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "provider:\n  runtime: runx\n");

    Command::new(env!("CARGO_BIN_EXE_nodelet"))
        .arg("start")
        .arg("--config")
        .arg(&config)
        .arg("--node-name")
        .arg("node-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to create provider factory"));
}
