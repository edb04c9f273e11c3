use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use filetrigger::engine::ChangeEvent;
use filetrigger::errors::{FileTriggerError, Result};
use filetrigger::logging::EventSink;
use filetrigger::types::WatchMode;
use filetrigger::watch::{DetectionStrategy, Readiness, WatchId, WatchedFile};

#[derive(Default)]
struct Shared {
    pending: HashMap<WatchId, Vec<ChangeEvent>>,
    fail_rearm: HashSet<WatchId>,
    armed: Vec<WatchId>,
    rearmed: Vec<WatchId>,
}

/// Test driver for a [`ScriptedStrategy`].
#[derive(Clone)]
pub struct ScriptHandle {
    shared: Arc<Mutex<Shared>>,
    tx: mpsc::UnboundedSender<Readiness>,
}

impl ScriptHandle {
    /// Events returned by the next `probe`/`detect` of their file.
    pub fn preload(&self, events: Vec<ChangeEvent>) {
        let mut shared = self.shared.lock().unwrap();
        for event in events {
            shared.pending.entry(event.watch_id).or_default().push(event);
        }
    }

    /// Wake the runtime for one file with these candidates.
    pub fn ready(&self, id: WatchId, events: Vec<ChangeEvent>) {
        self.preload(events);
        let _ = self.tx.send(Readiness::Ready(id));
    }

    pub fn tick(&self, events: Vec<ChangeEvent>) {
        self.preload(events);
        let _ = self.tx.send(Readiness::Tick);
    }

    pub fn fail_rearm(&self, id: WatchId) {
        self.shared.lock().unwrap().fail_rearm.insert(id);
    }

    pub fn armed(&self) -> Vec<WatchId> {
        self.shared.lock().unwrap().armed.clone()
    }

    pub fn rearmed(&self) -> Vec<WatchId> {
        self.shared.lock().unwrap().rearmed.clone()
    }
}

/// A fake detection strategy whose wake-ups and candidates are scripted by
/// the test through a [`ScriptHandle`].
///
/// Dropping every handle makes `wait` report [`Readiness::Closed`].
pub struct ScriptedStrategy {
    mode: WatchMode,
    shared: Arc<Mutex<Shared>>,
    rx: mpsc::UnboundedReceiver<Readiness>,
}

impl ScriptedStrategy {
    pub fn new(mode: WatchMode) -> (Self, ScriptHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let strategy = Self {
            mode,
            shared: shared.clone(),
            rx,
        };
        (strategy, ScriptHandle { shared, tx })
    }

    fn take(&self, id: WatchId) -> Vec<ChangeEvent> {
        self.shared
            .lock()
            .unwrap()
            .pending
            .remove(&id)
            .unwrap_or_default()
    }
}

impl DetectionStrategy for ScriptedStrategy {
    fn mode(&self) -> WatchMode {
        self.mode
    }

    fn arm(&mut self, file: &WatchedFile) -> Result<()> {
        self.shared.lock().unwrap().armed.push(file.id());
        Ok(())
    }

    fn wait<'a>(
        &'a mut self,
        shutdown: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Readiness> + Send + 'a>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => Readiness::Shutdown,
                next = self.rx.recv() => next.unwrap_or(Readiness::Closed),
            }
        })
    }

    fn probe(&mut self, file: &mut WatchedFile, _sink: &dyn EventSink) -> Vec<ChangeEvent> {
        self.take(file.id())
    }

    fn detect(&mut self, file: &mut WatchedFile, _sink: &dyn EventSink) -> Vec<ChangeEvent> {
        self.take(file.id())
    }

    fn rearm(&mut self, file: &WatchedFile) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_rearm.contains(&file.id()) {
            return Err(FileTriggerError::RearmFailed {
                directory: file.directory().to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        shared.rearmed.push(file.id());
        Ok(())
    }
}
