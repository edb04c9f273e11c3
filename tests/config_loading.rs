// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use filetrigger::cli::CliArgs;
use filetrigger::config::{load_and_validate, load_from_path, load_with_overrides};
use filetrigger::errors::FileTriggerError;
use filetrigger::types::WatchMode;
use filetrigger::watch::MAX_WATCHED_FILES;
use filetrigger_test_utils::builders::ConfigFileBuilder;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("filetrigger.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn full_file_is_loaded() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[watch]
mode = "notification"
poll_interval_ms = 250
files = ["/srv/exchange/prices.xml", "/srv/exchange/stock.xml"]
dispatch_on_startup = false

[dispatch]
script = "/srv/scripts/send.ps1"
interpreter = "pwsh"
args = ["-NoProfile", "-File", "{script}", "-FileName", "{file}"]
timeout_secs = 300
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.mode, WatchMode::Notify);
    assert_eq!(cfg.poll_interval, Duration::from_millis(250));
    assert_eq!(cfg.files.len(), 2);
    assert!(!cfg.dispatch_on_startup);
    assert_eq!(cfg.script, PathBuf::from("/srv/scripts/send.ps1"));
    assert_eq!(cfg.interpreter, "pwsh");
    assert_eq!(cfg.args[0], "-NoProfile");
    assert_eq!(cfg.script_timeout, Some(Duration::from_secs(300)));
}

#[test]
fn defaults_fill_missing_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[watch]
files = ["a.xml"]

[dispatch]
script = "send.sh"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.mode, WatchMode::Polling);
    assert_eq!(cfg.poll_interval, Duration::from_millis(500));
    assert!(cfg.dispatch_on_startup);
    assert!(cfg.script_timeout.is_none());
}

#[test]
fn unknown_mode_is_a_toml_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[watch]\nmode = \"inotify\"\n");
    assert!(matches!(
        load_from_path(&path),
        Err(FileTriggerError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, FileTriggerError::IoError(_)));
}

#[test]
fn command_line_overrides_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[watch]
mode = "notify"
files = ["from-file.xml"]

[dispatch]
script = "file.sh"
"#,
    );

    let args = CliArgs::try_parse_from([
        "filetrigger",
        "--config",
        path.to_str().unwrap(),
        "--script",
        "cli.sh",
        "--mode",
        "polling",
        "--poll-interval-ms",
        "50",
        "--script-timeout-secs",
        "9",
        "--no-initial-dispatch",
        "cli-a.xml",
        "cli-b.xml",
    ])
    .unwrap();

    let cfg = load_with_overrides(&args).unwrap();
    assert_eq!(cfg.script, PathBuf::from("cli.sh"));
    assert_eq!(cfg.mode, WatchMode::Polling);
    assert_eq!(cfg.poll_interval, Duration::from_millis(50));
    assert_eq!(
        cfg.files,
        vec![PathBuf::from("cli-a.xml"), PathBuf::from("cli-b.xml")]
    );
    assert_eq!(cfg.script_timeout, Some(Duration::from_secs(9)));
    assert!(!cfg.dispatch_on_startup);
}

#[test]
fn command_line_alone_is_enough() {
    let args = CliArgs::try_parse_from(["filetrigger", "-s", "send.sh", "a.xml"]).unwrap();
    let cfg = load_with_overrides(&args).unwrap();
    assert_eq!(cfg.files, vec![PathBuf::from("a.xml")]);
}

#[test]
fn no_files_fails_startup() {
    let args = CliArgs::try_parse_from(["filetrigger", "-s", "send.sh"]).unwrap();
    assert!(matches!(
        load_with_overrides(&args),
        Err(FileTriggerError::NoWatchedFiles)
    ));
}

#[test]
fn more_files_than_wait_slots_fails_startup() {
    let raw = ConfigFileBuilder::new()
        .with_files(MAX_WATCHED_FILES + 1, "/srv")
        .raw();
    assert!(matches!(
        filetrigger::config::ConfigFile::try_from(raw),
        Err(FileTriggerError::TooManyWatches { .. })
    ));

    let ok = ConfigFileBuilder::new()
        .with_files(MAX_WATCHED_FILES, "/srv")
        .build();
    assert_eq!(ok.files.len(), MAX_WATCHED_FILES);
}

#[test]
fn zero_timeout_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_file("a.xml")
        .timeout_secs(0)
        .raw();
    assert!(matches!(
        filetrigger::config::ConfigFile::try_from(raw),
        Err(FileTriggerError::ConfigError(_))
    ));
}
