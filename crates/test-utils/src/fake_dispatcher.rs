use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use filetrigger::engine::DispatchRequest;
use filetrigger::exec::{DispatchOutcome, Dispatcher};

/// Shared view of what a [`RecordingDispatcher`] has been asked to do.
#[derive(Clone, Default)]
pub struct DispatchLog {
    calls: Arc<Mutex<Vec<DispatchRequest>>>,
    finished: Arc<Mutex<usize>>,
    changed: Arc<Notify>,
}

impl DispatchLog {
    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.calls().into_iter().map(|r| r.triggering_path).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of dispatches that ran to completion.
    pub fn finished(&self) -> usize {
        *self.finished.lock().unwrap()
    }

    /// Wait until at least `n` dispatches have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                if self.len() >= n {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("expected {n} dispatch(es), saw {}", self.len()));
    }
}

/// A fake dispatcher that:
/// - records every request it receives
/// - optionally holds each call open until [`RecordingDispatcher::gate`] is
///   released, to exercise shutdown during a dispatch.
pub struct RecordingDispatcher {
    log: DispatchLog,
    gate: Option<Arc<Notify>>,
    outcome: DispatchOutcome,
}

impl RecordingDispatcher {
    pub fn new() -> (Self, DispatchLog) {
        let log = DispatchLog::default();
        let dispatcher = Self {
            log: log.clone(),
            gate: None,
            outcome: DispatchOutcome::Success,
        };
        (dispatcher, log)
    }

    /// Hold every call until the returned handle is notified once per call.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn with_outcome(mut self, outcome: DispatchOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(
        &mut self,
        request: DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = DispatchOutcome> + Send + '_>> {
        let log = self.log.clone();
        let gate = self.gate.clone();
        let outcome = self.outcome.clone();

        Box::pin(async move {
            log.calls.lock().unwrap().push(request);
            log.changed.notify_waiters();

            if let Some(gate) = gate {
                gate.notified().await;
            }

            *log.finished.lock().unwrap() += 1;
            log.changed.notify_waiters();
            outcome
        })
    }
}
