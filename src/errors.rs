// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileTriggerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No files to watch: at least one path is required")]
    NoWatchedFiles,

    #[error("Too many watched files: {count} (at most {max} are supported)")]
    TooManyWatches { count: usize, max: usize },

    #[error("Invalid watch path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Failed to re-arm change notifications for {directory:?}: {reason}")]
    RearmFailed { directory: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Watcher error: {0}")]
    NotifyError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FileTriggerError>;
