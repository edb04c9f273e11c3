// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::{FileTriggerError, Result};
use crate::exec::Dispatcher;
use crate::fs::FileSystem;
use crate::logging::EventSink;
use crate::watch::registry::{Registry, WatchId};
use crate::watch::strategy::{DetectionStrategy, Readiness};

use super::filter::ChangeFilter;
use super::{DispatchRequest, FilePhase, LoopState};

/// Runtime behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Run the script for every readable file during the startup check.
    pub dispatch_on_startup: bool,
    /// Stop after the startup check instead of entering the loop.
    pub exit_after_startup: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            dispatch_on_startup: true,
            exit_after_startup: false,
        }
    }
}

/// Counters returned when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub dispatches: usize,
    pub failed_dispatches: usize,
}

/// Multiplexes the detection sources and the shutdown signal, and delegates
/// script execution to a `Dispatcher`.
///
/// Everything happens on the task that calls [`Runtime::run`]: one file is
/// detected, confirmed and dispatched at a time, and a dispatch is awaited to
/// completion before the next wait begins.
pub struct Runtime<S: DetectionStrategy, D: Dispatcher> {
    registry: Registry,
    strategy: S,
    dispatcher: D,
    filter: ChangeFilter,
    sink: Arc<dyn EventSink>,
    options: RuntimeOptions,
    state: LoopState,
    stats: RunStats,
}

impl<S: DetectionStrategy, D: Dispatcher> fmt::Debug for Runtime<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: DetectionStrategy, D: Dispatcher> Runtime<S, D> {
    pub fn new(
        registry: Registry,
        strategy: S,
        dispatcher: D,
        fs: Arc<dyn FileSystem>,
        sink: Arc<dyn EventSink>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            registry,
            strategy,
            dispatcher,
            filter: ChangeFilter::new(fs),
            sink,
            options,
            state: LoopState::Running,
            stats: RunStats::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Main loop.
    ///
    /// - Arms every watched file and runs the startup check.
    /// - Waits for a tick, a ready file or `shutdown`.
    /// - Detects, confirms and dispatches, then re-arms the source.
    ///
    /// Returns when `shutdown` fires (after any running dispatch finishes)
    /// or with an error if a source cannot be re-armed.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<RunStats> {
        if self.registry.mode() != self.strategy.mode() {
            return Err(FileTriggerError::ConfigError(format!(
                "registry uses {} detection but the strategy is {}",
                self.registry.mode(),
                self.strategy.mode()
            )));
        }

        self.sink.success(format!(
            "filetrigger started: {} file(s), {} detection",
            self.registry.len(),
            self.strategy.mode()
        ));

        for id in self.registry.ids() {
            let Some(file) = self.registry.get(id) else {
                continue;
            };
            self.strategy.arm(file)?;
            self.sink
                .success(format!("Added '{}' for watching", file.path().display()));
        }

        let dispatch = self.options.dispatch_on_startup;
        for id in self.registry.ids() {
            self.cycle(id, true, dispatch, &shutdown).await;
        }

        if self.options.exit_after_startup {
            info!("startup check finished; exiting");
            self.state = LoopState::Stopped;
            return Ok(self.stats);
        }

        while self.state == LoopState::Running {
            match self.strategy.wait(&shutdown).await {
                Readiness::Tick => {
                    for id in self.registry.ids() {
                        self.cycle(id, false, true, &shutdown).await;
                        if self.state != LoopState::Running {
                            break;
                        }
                    }
                }
                Readiness::Ready(id) => {
                    self.cycle(id, false, true, &shutdown).await;
                    if self.state == LoopState::Running {
                        self.rearm(id)?;
                    }
                }
                Readiness::Shutdown => self.begin_stopping(),
                Readiness::Closed => {
                    return Err(FileTriggerError::Other(anyhow::anyhow!(
                        "every detection source closed"
                    )));
                }
            }
        }

        self.state = LoopState::Stopped;
        info!(
            dispatches = self.stats.dispatches,
            failed = self.stats.failed_dispatches,
            "runtime stopped"
        );
        Ok(self.stats)
    }

    /// One detection cycle for one file.
    async fn cycle(&mut self, id: WatchId, startup: bool, dispatch: bool, shutdown: &CancellationToken) {
        let Some(file) = self.registry.get_mut(id) else {
            warn!(watch_id = %id, "ready signal for an unknown watch id");
            return;
        };
        let sink = self.sink.as_ref();

        trace!(watch_id = %id, phase = ?FilePhase::Detecting);
        let events = if startup {
            self.strategy.probe(file, sink)
        } else {
            self.strategy.detect(file, sink)
        };
        if events.is_empty() {
            trace!(watch_id = %id, phase = ?FilePhase::NoChange);
            return;
        }

        trace!(watch_id = %id, phase = ?FilePhase::Confirming, candidates = events.len());
        let request = events
            .iter()
            .find_map(|event| self.filter.confirm(file, event, sink));
        let Some(request) = request else {
            trace!(watch_id = %id, phase = ?FilePhase::Idle, "nothing confirmed");
            return;
        };

        sink.information(format!("File '{}' changed", file.path().display()));
        if !dispatch {
            debug!(watch_id = %id, "startup dispatch disabled; baseline recorded");
            return;
        }
        self.dispatch(request, shutdown).await;
        trace!(watch_id = %id, phase = ?FilePhase::Idle);
    }

    async fn dispatch(&mut self, request: DispatchRequest, shutdown: &CancellationToken) {
        if shutdown.is_cancelled() {
            self.sink.warning(format!(
                "Not running the script for '{}': stopping",
                request.triggering_path.display()
            ));
            self.begin_stopping();
            return;
        }

        trace!(watch_id = %request.watch_id, phase = ?FilePhase::Dispatching);
        let outcome = self.dispatcher.dispatch(request).await;
        self.stats.dispatches += 1;
        if !outcome.is_success() {
            self.stats.failed_dispatches += 1;
        }
        debug!(?outcome, "dispatch finished");
    }

    fn rearm(&mut self, id: WatchId) -> Result<()> {
        let Some(file) = self.registry.get(id) else {
            return Ok(());
        };
        if let Err(err) = self.strategy.rearm(file) {
            self.sink.error(format!(
                "Could not resume watching '{}': {}",
                file.path().display(),
                err
            ));
            return Err(err);
        }
        Ok(())
    }

    fn begin_stopping(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Stopping;
            self.sink.warning("Stopping".to_string());
        }
    }
}
