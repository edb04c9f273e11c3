// src/watch/strategy.rs

//! The detection interface shared by the polling and notification strategies.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::engine::ChangeEvent;
use crate::errors::Result;
use crate::logging::EventSink;
use crate::types::WatchMode;
use crate::watch::registry::{WatchId, WatchedFile};

/// What ended a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The shared poll tick elapsed; every file should be checked.
    Tick,
    /// One file's source has something to drain.
    Ready(WatchId),
    /// The shutdown signal fired.
    Shutdown,
    /// Every source is gone; nothing can become ready again.
    Closed,
}

/// A way of noticing that watched files may have changed.
///
/// The runtime drives a strategy through a fixed cycle per file:
/// `arm` once at startup, then repeatedly `wait` → `detect` → (filter,
/// dispatch) → `rearm`. `probe` is the "as found" check used at startup.
pub trait DetectionStrategy: Send {
    fn mode(&self) -> WatchMode;

    /// Start watching a freshly registered file.
    fn arm(&mut self, file: &WatchedFile) -> Result<()>;

    /// Block until a source is ready, the tick elapses, or shutdown fires.
    fn wait<'a>(
        &'a mut self,
        shutdown: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Readiness> + Send + 'a>>;

    /// Check a file outside of any wake signal (startup).
    fn probe(&mut self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent>;

    /// Drain whatever woke this file into change candidates.
    fn detect(&mut self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent>;

    /// Make the file's source able to fire again. Failure is fatal.
    fn rearm(&mut self, file: &WatchedFile) -> Result<()>;
}
