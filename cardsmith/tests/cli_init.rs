//! CLI tests for `cardsmith init` and argument handling.
//!
//! Spawns the binary and checks exit codes and the files it writes.

use std::fs;
use std::process::Command;

use cardsmith::exit_codes;
use cardsmith::io::config::{AppConfig, load_config};

fn cardsmith() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cardsmith"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn init_writes_default_config() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = cardsmith()
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("cardsmith init");

    assert_eq!(status.code(), Some(exit_codes::OK));
    let cfg = load_config(&temp.path().join("cardsmith.toml")).expect("load");
    assert_eq!(cfg, AppConfig::default());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("custom.toml");
    fs::write(&path, "max_retries = 1\n").expect("write");

    let refused = cardsmith()
        .current_dir(temp.path())
        .args(["init", "--config", "custom.toml"])
        .output()
        .expect("cardsmith init");
    assert_eq!(refused.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&refused.stderr).contains("already exists"));
    assert_eq!(load_config(&path).expect("load").max_retries, 1);

    let forced = cardsmith()
        .current_dir(temp.path())
        .args(["init", "--config", "custom.toml", "--force"])
        .status()
        .expect("cardsmith init --force");
    assert_eq!(forced.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load").max_retries, 3);
}

#[test]
fn run_rejects_blank_request() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cardsmith()
        .current_dir(temp.path())
        .args(["run", "   ", "--dry-run"])
        .output()
        .expect("cardsmith run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("request must not be empty"));
    assert!(!temp.path().join(".cardsmith").exists());
}

#[test]
fn invalid_config_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("cardsmith.toml"),
        "[evaluator]\nallowed_categories = []\n",
    )
    .expect("write");

    let output = cardsmith()
        .current_dir(temp.path())
        .args(["run", "Fix the login page crashing on iOS", "--dry-run"])
        .output()
        .expect("cardsmith run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("allowed_categories"));
}
