// src/engine/filter.rs

//! Pure change confirmation.
//!
//! The filter is the only place a baseline advances. It performs no waiting
//! and spawns nothing, so it is unit tested against the mock filesystem.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::engine::{ChangeEvent, ChangeKind, DispatchRequest};
use crate::fs::FileSystem;
use crate::logging::EventSink;
use crate::watch::registry::{Baseline, WatchedFile};

#[derive(Debug, Clone)]
pub struct ChangeFilter {
    fs: Arc<dyn FileSystem>,
}

impl ChangeFilter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Decide whether `event` is a real change to `file`.
    ///
    /// On confirmation the baseline has already advanced, so a repeat of the
    /// same signal is never confirmed twice.
    pub fn confirm(
        &self,
        file: &mut WatchedFile,
        event: &ChangeEvent,
        sink: &dyn EventSink,
    ) -> Option<DispatchRequest> {
        let id = file.id();
        let path = file.path().to_path_buf();

        let confirmed = match (event.kind, file.baseline_mut()) {
            (ChangeKind::ContentDiffers, Baseline::Polling { current, previous }) => {
                *previous = *current;
                true
            }
            (
                ChangeKind::NotifiedModify | ChangeKind::NotifiedRenameIn,
                Baseline::Notification { last_write },
            ) => match self.fs.modified(&path) {
                Ok(written) => {
                    if last_write.is_none_or(|seen| written > seen) {
                        *last_write = Some(written);
                        true
                    } else {
                        trace!(watch_id = %id, ?written, "write time not newer; dropping");
                        false
                    }
                }
                Err(err) => {
                    sink.warning(format!(
                        "Could not read the write time of '{}': {:#}",
                        path.display(),
                        err
                    ));
                    false
                }
            },
            (kind, baseline) => {
                sink.error(format!(
                    "Watch {id} received {kind:?} but holds {baseline:?}; ignoring"
                ));
                false
            }
        };

        if !confirmed {
            return None;
        }

        debug!(watch_id = %id, kind = ?event.kind, name = ?event.observed_name, "change confirmed");
        Some(DispatchRequest {
            watch_id: id,
            triggering_path: path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::logging::{MemorySink, Severity};
    use crate::types::WatchMode;
    use crate::watch::hash::compute_file_digest;
    use crate::watch::registry::Registry;

    fn notify_setup() -> (MockFileSystem, Registry, ChangeFilter) {
        let fs = MockFileSystem::new();
        fs.add_file("/data/A.txt", b"v1".to_vec());
        let mut reg = Registry::new(WatchMode::Notify);
        reg.register(&fs, "/data/A.txt").unwrap();
        let filter = ChangeFilter::new(Arc::new(fs.clone()));
        (fs, reg, filter)
    }

    fn modify(reg: &Registry) -> ChangeEvent {
        ChangeEvent::new(reg.ids()[0], ChangeKind::NotifiedModify)
    }

    #[test]
    fn first_notification_confirms_and_records_write_time() {
        let (fs, mut reg, filter) = notify_setup();
        let sink = MemorySink::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        fs.set_modified("/data/A.txt", t0);

        let event = modify(&reg);
        let file = reg.get_mut(event.watch_id).unwrap();
        let req = filter.confirm(file, &event, &sink).unwrap();

        assert_eq!(req.triggering_path, file.path());
        assert_eq!(file.baseline(), &Baseline::Notification { last_write: Some(t0) });
    }

    #[test]
    fn duplicate_notifications_confirm_once() {
        let (fs, mut reg, filter) = notify_setup();
        let sink = MemorySink::new();
        let event = modify(&reg);
        let file = reg.get_mut(event.watch_id).unwrap();

        assert!(filter.confirm(file, &event, &sink).is_some());
        assert!(filter.confirm(file, &event, &sink).is_none());

        let rename = ChangeEvent::new(event.watch_id, ChangeKind::NotifiedRenameIn).with_name("a.txt");
        assert!(filter.confirm(file, &rename, &sink).is_none());

        fs.touch("/data/A.txt");
        assert!(filter.confirm(file, &rename, &sink).is_some());
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn older_write_time_is_not_a_change() {
        let (fs, mut reg, filter) = notify_setup();
        let sink = MemorySink::new();
        let event = modify(&reg);
        let file = reg.get_mut(event.watch_id).unwrap();

        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000);
        fs.set_modified("/data/A.txt", t1);
        assert!(filter.confirm(file, &event, &sink).is_some());

        fs.set_modified("/data/A.txt", t1 - Duration::from_secs(1));
        assert!(filter.confirm(file, &event, &sink).is_none());
        assert_eq!(file.baseline(), &Baseline::Notification { last_write: Some(t1) });
    }

    #[test]
    fn metadata_failure_is_transient() {
        let (fs, mut reg, filter) = notify_setup();
        let sink = MemorySink::new();
        let event = modify(&reg);
        let file = reg.get_mut(event.watch_id).unwrap();

        fs.remove("/data/A.txt");
        assert!(filter.confirm(file, &event, &sink).is_none());
        assert_eq!(file.baseline(), &Baseline::Notification { last_write: None });
        assert!(sink.contains(Severity::Warning, "write time"));

        fs.add_file("/data/A.txt", b"back".to_vec());
        assert!(filter.confirm(file, &event, &sink).is_some());
    }

    #[test]
    fn content_difference_advances_previous_digest() {
        let fs = MockFileSystem::new();
        fs.add_file("/data/A.txt", b"h1".to_vec());
        let mut reg = Registry::new(WatchMode::Polling);
        let id = reg.register(&fs, "/data/A.txt").unwrap();
        let filter = ChangeFilter::new(Arc::new(fs.clone()));
        let sink = MemorySink::new();

        let digest = compute_file_digest(&fs, std::path::Path::new("/data/A.txt")).unwrap();
        let file = reg.get_mut(id).unwrap();
        *file.baseline_mut() = Baseline::Polling {
            current: Some(digest),
            previous: None,
        };

        let event = ChangeEvent::new(id, ChangeKind::ContentDiffers);
        assert!(filter.confirm(file, &event, &sink).is_some());
        assert_eq!(
            file.baseline(),
            &Baseline::Polling {
                current: Some(digest),
                previous: Some(digest)
            }
        );
    }

    #[test]
    fn mismatched_event_and_baseline_is_rejected() {
        let (_fs, mut reg, filter) = notify_setup();
        let sink = MemorySink::new();
        let id = reg.ids()[0];
        let event = ChangeEvent::new(id, ChangeKind::ContentDiffers);

        assert!(filter.confirm(reg.get_mut(id).unwrap(), &event, &sink).is_none());
        assert_eq!(sink.count(Severity::Error), 1);
    }
}
