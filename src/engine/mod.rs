// src/engine/mod.rs

//! Detection and dispatch engine.
//!
//! - [`filter`] is the pure confirmation step: it turns raw
//!   [`ChangeEvent`]s into at most one [`DispatchRequest`] per baseline
//!   transition.
//! - [`runtime`] is the async shell: it multiplexes the detection sources and
//!   the shutdown signal, and hands confirmed changes to the dispatcher one at
//!   a time.

use std::path::PathBuf;

use crate::watch::registry::WatchId;

pub mod filter;
pub mod runtime;

pub use filter::ChangeFilter;
pub use runtime::{Runtime, RuntimeOptions, RunStats};

/// Why a detection source thinks a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Polling found a digest different from the baseline.
    ContentDiffers,
    /// The directory reported the file as modified.
    NotifiedModify,
    /// The directory reported the file as renamed into place.
    NotifiedRenameIn,
}

/// Raw change candidate, produced by a detection source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub watch_id: WatchId,
    pub kind: ChangeKind,
    /// Name as reported by the notification, if any.
    pub observed_name: Option<String>,
}

impl ChangeEvent {
    pub fn new(watch_id: WatchId, kind: ChangeKind) -> Self {
        Self {
            watch_id,
            kind,
            observed_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.observed_name = Some(name.into());
        self
    }
}

/// A confirmed change that should run the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub watch_id: WatchId,
    pub triggering_path: PathBuf,
}

/// Per-file progress through one detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePhase {
    Idle,
    Detecting,
    NoChange,
    Confirming,
    Dispatching,
}

/// State of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}
