// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Build the effective configuration for a run.
///
/// Starts from `--config` (if given) and lets every command-line value that
/// was actually supplied override the file.
pub fn load_with_overrides(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = match args.config {
        Some(ref path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };

    apply_cli_overrides(&mut raw, args);

    ConfigFile::try_from(raw)
}

fn apply_cli_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    if !args.files.is_empty() {
        raw.watch.files = args.files.clone();
    }
    if let Some(ref script) = args.script {
        raw.dispatch.script = Some(script.clone());
    }
    if let Some(mode) = args.mode {
        raw.watch.mode = mode;
    }
    if let Some(ms) = args.poll_interval_ms {
        raw.watch.poll_interval_ms = ms;
    }
    if let Some(ref interpreter) = args.interpreter {
        raw.dispatch.interpreter = Some(interpreter.clone());
    }
    if let Some(secs) = args.script_timeout_secs {
        raw.dispatch.timeout_secs = Some(secs);
    }
    if args.no_initial_dispatch {
        raw.watch.dispatch_on_startup = false;
    }
}
