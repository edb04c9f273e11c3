// src/config/mod.rs

//! Configuration loading and validation for filetrigger.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and merge CLI overrides (`loader.rs`).
//! - Validate the invariants the engine relies on (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_with_overrides};
pub use model::{ConfigFile, DispatchSection, RawConfigFile, WatchSection};
