// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FileTriggerError, Result};
use crate::watch::registry::MAX_WATCHED_FILES;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::FileTriggerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let script = raw.dispatch.script.clone().ok_or_else(|| {
            FileTriggerError::ConfigError("no script configured".to_string())
        })?;
        Ok(ConfigFile::new_unchecked(raw, script))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_files(cfg)?;
    validate_watch_section(cfg)?;
    validate_dispatch_section(cfg)?;
    Ok(())
}

fn validate_files(cfg: &RawConfigFile) -> Result<()> {
    let count = cfg.watch.files.len();
    if count == 0 {
        return Err(FileTriggerError::NoWatchedFiles);
    }
    if count > MAX_WATCHED_FILES {
        return Err(FileTriggerError::TooManyWatches {
            count,
            max: MAX_WATCHED_FILES,
        });
    }
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.poll_interval_ms == 0 {
        return Err(FileTriggerError::ConfigError(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_dispatch_section(cfg: &RawConfigFile) -> Result<()> {
    match cfg.dispatch.script {
        None => {
            return Err(FileTriggerError::ConfigError(
                "no script configured (use --script or [dispatch].script)".to_string(),
            ));
        }
        Some(ref script) if script.as_os_str().is_empty() => {
            return Err(FileTriggerError::ConfigError(
                "[dispatch].script must not be empty".to_string(),
            ));
        }
        Some(_) => {}
    }

    if let Some(ref interpreter) = cfg.dispatch.interpreter {
        if interpreter.trim().is_empty() {
            return Err(FileTriggerError::ConfigError(
                "[dispatch].interpreter must not be empty".to_string(),
            ));
        }
    }

    if let Some(ref args) = cfg.dispatch.args {
        if !args.iter().any(|a| a.contains("{file}")) {
            return Err(FileTriggerError::ConfigError(
                "[dispatch].args must reference the changed file with {file}".to_string(),
            ));
        }
    }

    if cfg.dispatch.timeout_secs == Some(0) {
        return Err(FileTriggerError::ConfigError(
            "[dispatch].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
