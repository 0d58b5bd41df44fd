//! End-to-end tests that exercise the compiled `modelcourier` binary through
//! `assert_cmd`, the same way the pack's CLI tests drive the real executable
//! instead of calling its library functions directly.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG_FILES: &[&str] = &[
    "guide.yaml",
    "model_registry.yaml",
    "price_table.yaml",
    "runtime.yaml",
    "task_patterns.yaml",
];

/// Copies the checked-in `config/` directory into a fresh temp dir so tests
/// never mutate the real configuration and can run in parallel.
fn staged_config_dir() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    let source = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    for name in CONFIG_FILES {
        let contents = fs::read_to_string(source.join(name))
            .unwrap_or_else(|e| panic!("reading config/{name}: {e}"));
        fs::write(dir.path().join(name), contents).expect("write staged config file");
    }
    dir
}

#[test]
fn help_lists_all_subcommands() {
    Command::cargo_bin("modelcourier")
        .expect("locate modelcourier binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("models"))
        .stdout(predicate::str::contains("health"));
}

#[test]
fn models_lists_every_registry_entry() {
    let config = staged_config_dir();
    Command::cargo_bin("modelcourier")
        .expect("locate modelcourier binary")
        .arg("--config-dir")
        .arg(config.path())
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-4-5-sonnet"));
}

#[test]
fn health_reports_one_line_per_provider() {
    let config = staged_config_dir();
    let output = Command::cargo_bin("modelcourier")
        .expect("locate modelcourier binary")
        .arg("--config-dir")
        .arg(config.path())
        .arg("health")
        .output()
        .expect("run health subcommand");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().count() >= 1);
}

#[test]
fn missing_config_dir_fails_with_context() {
    Command::cargo_bin("modelcourier")
        .expect("locate modelcourier binary")
        .arg("--config-dir")
        .arg("/nonexistent/config/dir")
        .arg("models")
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading model registry"));
}
