// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the configured script for
//! a confirmed change, using `tokio::process::Command`.
//!
//! - [`command`] renders the interpreter argument template for one file.
//! - [`backend`] provides the `Dispatcher` trait and the concrete
//!   `ScriptDispatcher` that the runtime uses in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod command;

pub use backend::{DispatchOutcome, Dispatcher, ScriptDispatcher};
pub use command::CommandTemplate;
