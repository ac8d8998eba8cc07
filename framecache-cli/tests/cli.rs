//! End-to-end tests for the `framecache` binary.
//!
//! Every test points `--config` into a temporary directory so the user's
//! real configuration is never touched.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn framecache(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_framecache"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run framecache binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_config_path_prints_override() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");

    let output = framecache(&config, &["config", "path"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), config.display().to_string());
}

#[test]
fn test_config_init_then_show() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("nested").join("config.ini");

    let init = framecache(&config, &["config", "init"]);
    assert!(init.status.success());
    assert!(config.exists());

    let again = framecache(&config, &["config", "init"]);
    assert!(again.status.success());
    assert!(stdout(&again).contains("already exists"));

    let show = framecache(&config, &["config", "show"]);
    assert!(show.status.success());
    let text = stdout(&show);
    assert!(text.contains("[prefetch]"));
    assert!(text.contains("memory_budget = 2GB"));
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");
    fs::write(&config, "[prefetch]\nwindow = wide\n").unwrap();

    let output = framecache(&config, &["config", "show"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("prefetch.window"));
}

#[test]
fn test_simulate_reports_all_components() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");
    fs::write(
        &config,
        "[prefetch]\nwindow = 4\n[retrieval]\ninitial_delay_ms = 1\nmax_delay_ms = 2\n[logging]\nlevel = warn\n",
    )
    .unwrap();

    let output = framecache(
        &config,
        &[
            "simulate",
            "--instances",
            "2",
            "--frames",
            "30",
            "--viewports",
            "2",
            "--steps",
            "6",
            "--step-ms",
            "5",
            "--failure-every",
            "5",
            "--frame-size",
            "1KB",
            "--budget",
            "16KB",
        ],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("Frames shown:       6"));
    assert!(text.contains("Prefetch:"));
    assert!(text.contains("Budget:             16KB"));
    assert!(text.contains("Live sources:       2"));
    assert!(temp.path().join("logs").join("framecache.log").exists());
}

#[test]
fn test_simulate_rejects_zero_viewports() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");

    let output = framecache(&config, &["simulate", "--viewports", "0"]);

    assert_eq!(output.status.code(), Some(1));
}
