// src/watch/polling.rs

//! Polling detection: hash every watched file on a shared tick.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::engine::{ChangeEvent, ChangeKind};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::logging::EventSink;
use crate::types::WatchMode;
use crate::watch::hash::compute_file_digest;
use crate::watch::registry::{Baseline, WatchedFile};
use crate::watch::strategy::{DetectionStrategy, Readiness};

pub struct PollingStrategy {
    fs: Arc<dyn FileSystem>,
    period: Duration,
    ticker: Option<Interval>,
}

impl std::fmt::Debug for PollingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingStrategy")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl PollingStrategy {
    pub fn new(fs: Arc<dyn FileSystem>, period: Duration) -> Self {
        Self {
            fs,
            period,
            ticker: None,
        }
    }

    fn ticker(&mut self) -> &mut Interval {
        let period = self.period;
        self.ticker.get_or_insert_with(|| {
            let mut ticker = interval_at(Instant::now() + period, period);
            // A long dispatch must not cause a burst of catch-up ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        })
    }

    /// Hash the file into `current` and compare it with `previous`.
    fn check(&self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent> {
        let digest = match compute_file_digest(self.fs.as_ref(), file.path()) {
            Ok(d) => {
                if file.note_read(true) {
                    sink.information(format!("File '{}' is readable again", file.path().display()));
                }
                d
            }
            Err(err) => {
                if file.note_read(false) {
                    sink.warning(format!(
                        "Failed to read '{}': {:#}",
                        file.path().display(),
                        err
                    ));
                } else {
                    debug!(watch_id = %file.id(), error = %err, "file still unreadable");
                }
                return Vec::new();
            }
        };

        let id = file.id();
        match file.baseline_mut() {
            Baseline::Polling { current, previous } => {
                *current = Some(digest);
                if *previous == *current {
                    trace!(watch_id = %id, "digest unchanged");
                    Vec::new()
                } else {
                    debug!(watch_id = %id, %digest, "digest differs from baseline");
                    vec![ChangeEvent::new(id, ChangeKind::ContentDiffers)]
                }
            }
            Baseline::Notification { .. } => {
                sink.error(format!(
                    "Watch {id} has a notification baseline under the polling strategy"
                ));
                Vec::new()
            }
        }
    }
}

impl DetectionStrategy for PollingStrategy {
    fn mode(&self) -> WatchMode {
        WatchMode::Polling
    }

    fn arm(&mut self, _file: &WatchedFile) -> Result<()> {
        // Every file shares the one tick.
        Ok(())
    }

    fn wait<'a>(
        &'a mut self,
        shutdown: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Readiness> + Send + 'a>> {
        Box::pin(async move {
            let ticker = self.ticker();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => Readiness::Shutdown,
                _ = ticker.tick() => Readiness::Tick,
            }
        })
    }

    fn probe(&mut self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent> {
        self.check(file, sink)
    }

    fn detect(&mut self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent> {
        self.check(file, sink)
    }

    fn rearm(&mut self, _file: &WatchedFile) -> Result<()> {
        Ok(())
    }
}
