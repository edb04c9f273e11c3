// src/watch/notification.rs

//! Notification detection: directory-change subscriptions plus write-time
//! confirmation.
//!
//! Each watched file owns one non-recursive subscription on its containing
//! directory. The OS side ([`notify`] callbacks, or a host pushing through a
//! [`RecordFeed`]) appends raw records to the subscription's bounded batch.
//! An armed subscription signals its [`WatchId`] once and disarms; records
//! keep accumulating until the runtime drains the batch and re-arms.
//!
//! Notifications never trigger a dispatch on their own. They only produce
//! candidates that the change filter confirms against the modification time.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::engine::{ChangeEvent, ChangeKind};
use crate::errors::{FileTriggerError, Result};
use crate::fs::FileSystem;
use crate::logging::EventSink;
use crate::types::WatchMode;
use crate::watch::record::{decode, Action, BatchEncoder};
use crate::watch::registry::{WatchId, WatchedFile};
use crate::watch::strategy::{DetectionStrategy, Readiness};

/// Capacity of one subscription's batch buffer.
pub const NOTIFY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug)]
struct SubscriptionState {
    armed: bool,
    batch: BatchEncoder,
    failure: Option<String>,
}

/// Producer side of one directory subscription.
///
/// The OS watcher callback holds one; hosts that receive directory changes
/// some other way can obtain one from [`NotificationStrategy::feed`].
#[derive(Debug, Clone)]
pub struct RecordFeed {
    id: WatchId,
    state: Arc<Mutex<SubscriptionState>>,
    ready: mpsc::UnboundedSender<WatchId>,
}

impl RecordFeed {
    fn new(id: WatchId, ready: mpsc::UnboundedSender<WatchId>) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(SubscriptionState {
                armed: false,
                batch: BatchEncoder::with_capacity(NOTIFY_BUFFER_SIZE),
                failure: None,
            })),
            ready,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn signal(&self, state: &mut SubscriptionState) {
        if state.armed {
            state.armed = false;
            // The receiver only goes away with the strategy itself.
            let _ = self.ready.send(self.id);
        }
    }

    /// Append one record for an entry of the watched directory.
    pub fn push(&self, action: Action, name: &str) {
        self.push_bytes(action, name.as_bytes());
    }

    pub fn push_bytes(&self, action: Action, name: &[u8]) {
        let mut state = self.lock();
        if !state.batch.push(action, name) {
            trace!(watch_id = %self.id, "change batch full; marking overflow");
        }
        self.signal(&mut state);
    }

    /// Report that changes were lost (e.g. the OS queue overflowed).
    pub fn overflow(&self) {
        let mut state = self.lock();
        state.batch.mark_overflow();
        self.signal(&mut state);
    }

    /// Report that the subscription can no longer deliver changes.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        state.failure = Some(reason.into());
        self.signal(&mut state);
    }

    /// Arm the subscription, or signal right away if work is already pending.
    fn arm(&self) {
        let mut state = self.lock();
        state.armed = true;
        if !state.batch.is_empty() || state.failure.is_some() {
            self.signal(&mut state);
        }
    }

    fn failure(&self) -> Option<String> {
        self.lock().failure.clone()
    }

    /// Move the pending batch into `out`; returns whether it overflowed.
    fn drain_into(&self, out: &mut Vec<u8>) -> bool {
        self.lock().batch.take_into(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Subscriptions are backed by `notify` watchers.
    Os,
    /// Records arrive only through [`RecordFeed`]s handed out to the host.
    Manual,
}

struct Subscription {
    feed: RecordFeed,
    watcher: Option<RecommendedWatcher>,
}

pub struct NotificationStrategy {
    fs: Arc<dyn FileSystem>,
    backend: Backend,
    subscriptions: Vec<Option<Subscription>>,
    ready_tx: mpsc::UnboundedSender<WatchId>,
    ready_rx: mpsc::UnboundedReceiver<WatchId>,
    /// Decode buffer, reused for every file and cleared after each batch.
    scratch: Vec<u8>,
}

impl std::fmt::Debug for NotificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStrategy")
            .field("backend", &self.backend)
            .field(
                "subscriptions",
                &self.subscriptions.iter().filter(|s| s.is_some()).count(),
            )
            .finish_non_exhaustive()
    }
}

impl NotificationStrategy {
    /// Strategy backed by the platform's recommended watcher.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self::with_backend(fs, Backend::Os)
    }

    /// Strategy without OS watchers; records come from [`Self::feed`].
    pub fn manual(fs: Arc<dyn FileSystem>) -> Self {
        Self::with_backend(fs, Backend::Manual)
    }

    fn with_backend(fs: Arc<dyn FileSystem>, backend: Backend) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Self {
            fs,
            backend,
            subscriptions: Vec::new(),
            ready_tx,
            ready_rx,
            scratch: Vec::with_capacity(NOTIFY_BUFFER_SIZE),
        }
    }

    /// Producer handle for a file's subscription, creating it if needed.
    pub fn feed(&mut self, id: WatchId) -> RecordFeed {
        self.slot(id).feed.clone()
    }

    fn slot(&mut self, id: WatchId) -> &mut Subscription {
        let index = id.index();
        if self.subscriptions.len() <= index {
            self.subscriptions.resize_with(index + 1, || None);
        }
        let ready = self.ready_tx.clone();
        self.subscriptions[index].get_or_insert_with(|| Subscription {
            feed: RecordFeed::new(id, ready),
            watcher: None,
        })
    }

    fn subscription(&self, id: WatchId) -> Option<&Subscription> {
        self.subscriptions.get(id.index()).and_then(Option::as_ref)
    }
}

impl DetectionStrategy for NotificationStrategy {
    fn mode(&self) -> WatchMode {
        WatchMode::Notify
    }

    fn arm(&mut self, file: &WatchedFile) -> Result<()> {
        let backend = self.backend;
        let sub = self.slot(file.id());

        if backend == Backend::Os && sub.watcher.is_none() {
            let watcher = spawn_directory_watcher(sub.feed.clone(), file.directory())?;
            sub.watcher = Some(watcher);
            info!(
                watch_id = %file.id(),
                directory = ?file.directory(),
                "subscribed to directory changes"
            );
        }

        sub.feed.arm();
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
                id = self.ready_rx.recv() => match id {
                    Some(id) => Readiness::Ready(id),
                    None => Readiness::Closed,
                },
            }
        })
    }

    fn probe(&mut self, file: &mut WatchedFile, _sink: &dyn EventSink) -> Vec<ChangeEvent> {
        // The file as found is confirmed (or not) by its write time.
        vec![ChangeEvent::new(file.id(), ChangeKind::NotifiedModify)]
    }

    fn detect(&mut self, file: &mut WatchedFile, sink: &dyn EventSink) -> Vec<ChangeEvent> {
        let Some(sub) = self.subscriptions.get(file.id().index()).and_then(Option::as_ref) else {
            debug!(watch_id = %file.id(), "no subscription to drain");
            return Vec::new();
        };

        let overflowed = sub.feed.drain_into(&mut self.scratch);
        let mut events = collect_changes(file, &self.scratch, sink);
        self.scratch.clear();

        if overflowed {
            sink.warning(format!(
                "Change buffer for '{}' overflowed; re-checking '{}'",
                file.directory().display(),
                file.base_name()
            ));
            events.push(ChangeEvent::new(file.id(), ChangeKind::NotifiedModify));
        }
        events
    }

    fn rearm(&mut self, file: &WatchedFile) -> Result<()> {
        let rearm_failed = |reason: String| FileTriggerError::RearmFailed {
            directory: file.directory().to_path_buf(),
            reason,
        };

        let sub = self
            .subscription(file.id())
            .ok_or_else(|| rearm_failed("file was never armed".to_string()))?;

        if let Some(reason) = sub.feed.failure() {
            return Err(rearm_failed(reason));
        }
        if self.backend == Backend::Os && sub.watcher.is_none() {
            return Err(rearm_failed("directory watcher is gone".to_string()));
        }
        if !self.fs.is_dir(file.directory()) {
            return Err(rearm_failed("directory no longer exists".to_string()));
        }

        sub.feed.arm();
        trace!(watch_id = %file.id(), "subscription re-armed");
        Ok(())
    }
}

/// Decode one drained batch into change candidates for `file`.
///
/// Only records naming the file (case-insensitively) with a `Modified` or
/// `RenamedTo` action count; temp-file traffic around them is ignored. A
/// malformed record is reported and ends the batch.
pub fn collect_changes(file: &WatchedFile, batch: &[u8], sink: &dyn EventSink) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for item in decode(batch) {
        let record = match item {
            Ok(record) => record,
            Err(err) => {
                sink.error(format!(
                    "Malformed change record for '{}': {err}; skipping the rest of the batch",
                    file.directory().display()
                ));
                break;
            }
        };

        let name = record.name();
        if !file.matches_name(&name) {
            trace!(watch_id = %file.id(), name = %name, "record for another entry");
            continue;
        }

        let kind = match record.action {
            Action::Modified => ChangeKind::NotifiedModify,
            Action::RenamedTo => ChangeKind::NotifiedRenameIn,
            other => {
                trace!(watch_id = %file.id(), action = ?other, "ignoring action");
                continue;
            }
        };
        events.push(ChangeEvent::new(file.id(), kind).with_name(name.into_owned()));
    }

    events
}

/// Map a `notify` event onto directory-change records.
fn records_for(event: &Event) -> Vec<(Action, &Path)> {
    let all = |action: Action| tag_all(event, action);

    match event.kind {
        EventKind::Access(_) | EventKind::Other => Vec::new(),
        EventKind::Create(_) => all(Action::Added),
        EventKind::Remove(_) => all(Action::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(Action::RenamedFrom),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(Action::RenamedTo),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .zip([Action::RenamedFrom, Action::RenamedTo])
            .map(|(p, a)| (a, p.as_path()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let action = if p.exists() {
                    Action::RenamedTo
                } else {
                    Action::RenamedFrom
                };
                (action, p.as_path())
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any => all(Action::Modified),
    }
}

fn tag_all(event: &Event, action: Action) -> Vec<(Action, &Path)> {
    event.paths.iter().map(|p| (action, p.as_path())).collect()
}

fn spawn_directory_watcher(feed: RecordFeed, directory: &Path) -> Result<RecommendedWatcher> {
    let dir: PathBuf = directory.to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.need_rescan() {
                    feed.overflow();
                    return;
                }
                for (action, path) in records_for(&event) {
                    if path == dir {
                        if action == Action::Removed || action == Action::RenamedFrom {
                            feed.fail(format!("watched directory {:?} went away", dir));
                        }
                        continue;
                    }
                    if path.parent() != Some(dir.as_path()) {
                        continue;
                    }
                    if let Some(name) = path.file_name() {
                        feed.push_bytes(action, name.as_encoded_bytes());
                    }
                }
            }
            Err(err) => feed.fail(err.to_string()),
        },
        Config::default(),
    )?;

    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
