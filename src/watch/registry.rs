// src/watch/registry.rs

//! The fixed set of watched files.
//!
//! Every file gets a stable [`WatchId`] at registration. Identity (path,
//! directory, base name) never changes afterwards; the detection baseline is
//! mutated only by that file's own detection cycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{FileTriggerError, Result};
use crate::fs::FileSystem;
use crate::types::WatchMode;
use crate::watch::hash::Digest;

/// Maximum number of watched files: 64 wait slots, one taken by shutdown.
pub const MAX_WATCHED_FILES: usize = 63;

/// Stable index of a watched file in the [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(usize);

impl WatchId {
    /// Id for the `index`-th registration. Only meaningful for a registry
    /// that holds at least `index + 1` files.
    pub fn from_index(index: usize) -> Self {
        WatchId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a watched file is currently compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// Digest pair. `None` means the file has never been read successfully.
    Polling {
        current: Option<Digest>,
        previous: Option<Digest>,
    },
    /// Last confirmed modification time.
    Notification { last_write: Option<SystemTime> },
}

impl Baseline {
    fn initial(mode: WatchMode) -> Self {
        match mode {
            WatchMode::Polling => Baseline::Polling {
                current: None,
                previous: None,
            },
            WatchMode::Notify => Baseline::Notification { last_write: None },
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchedFile {
    id: WatchId,
    path: PathBuf,
    directory: PathBuf,
    base_name: String,
    baseline: Baseline,
    /// Set while reads keep failing, so the failure is reported once.
    read_failing: bool,
}

impl WatchedFile {
    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn baseline_mut(&mut self) -> &mut Baseline {
        &mut self.baseline
    }

    /// Whether `name` refers to this file (case-insensitive).
    pub fn matches_name(&self, name: &str) -> bool {
        names_match(&self.base_name, name)
    }

    /// Record the outcome of a read; returns true when the state flipped.
    pub(crate) fn note_read(&mut self, ok: bool) -> bool {
        let flipped = self.read_failing == ok;
        self.read_failing = !ok;
        flipped
    }
}

/// Case-insensitive file name equality.
pub fn names_match(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Owned set of watched files, keyed by [`WatchId`].
#[derive(Debug, Clone)]
pub struct Registry {
    mode: WatchMode,
    files: Vec<WatchedFile>,
}

impl Registry {
    pub fn new(mode: WatchMode) -> Self {
        Self {
            mode,
            files: Vec::new(),
        }
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Register a file and return its id.
    ///
    /// The parent directory must exist; the file itself need not (it may be
    /// created later by the producer). Directory and base name are derived
    /// here, once.
    pub fn register(&mut self, fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<WatchId> {
        let path = path.as_ref();

        if self.files.len() >= MAX_WATCHED_FILES {
            return Err(FileTriggerError::TooManyWatches {
                count: self.files.len() + 1,
                max: MAX_WATCHED_FILES,
            });
        }

        let invalid = |reason: String| FileTriggerError::InvalidPath {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| invalid("path has no file name".to_string()))?;
        let base_name = file_name
            .to_str()
            .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?
            .to_string();

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let directory = fs
            .canonicalize(parent)
            .map_err(|e| invalid(format!("cannot resolve parent directory: {e}")))?;
        if !fs.is_dir(&directory) {
            return Err(invalid(format!("{:?} is not a directory", directory)));
        }

        if self
            .files
            .iter()
            .any(|f| f.directory == directory && f.matches_name(&base_name))
        {
            return Err(invalid("file is already being watched".to_string()));
        }

        let id = WatchId(self.files.len());
        self.files.push(WatchedFile {
            id,
            path: directory.join(file_name),
            directory,
            base_name,
            baseline: Baseline::initial(self.mode),
            read_failing: false,
        });
        Ok(id)
    }

    pub fn get(&self, id: WatchId) -> Option<&WatchedFile> {
        self.files.get(id.0)
    }

    pub fn get_mut(&mut self, id: WatchId) -> Option<&mut WatchedFile> {
        self.files.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchedFile> {
        self.files.iter()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<WatchId> {
        self.files.iter().map(|f| f.id).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn fs_with_dir() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_dir("/exchange");
        fs
    }

    #[test]
    fn register_splits_directory_and_name() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Polling);

        let id = reg.register(&fs, "/exchange/Prices.xml").unwrap();
        let file = reg.get(id).unwrap();

        assert_eq!(id.index(), 0);
        assert_eq!(file.directory(), Path::new("/exchange"));
        assert_eq!(file.base_name(), "Prices.xml");
        assert_eq!(file.path(), Path::new("/exchange/Prices.xml"));
        assert!(matches!(file.baseline(), Baseline::Polling { previous: None, .. }));
    }

    #[test]
    fn ids_follow_registration_order() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Notify);
        let a = reg.register(&fs, "/exchange/a.xml").unwrap();
        let b = reg.register(&fs, "/exchange/b.xml").unwrap();
        assert_eq!(reg.ids(), vec![a, b]);
        assert!(matches!(
            reg.get(b).unwrap().baseline(),
            Baseline::Notification { last_write: None }
        ));
    }

    #[test]
    fn missing_parent_is_invalid() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Polling);
        let err = reg.register(&fs, "/nowhere/a.xml").unwrap_err();
        assert!(matches!(err, FileTriggerError::InvalidPath { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected_case_insensitively() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Polling);
        reg.register(&fs, "/exchange/a.xml").unwrap();
        let err = reg.register(&fs, "/exchange/A.XML").unwrap_err();
        assert!(matches!(err, FileTriggerError::InvalidPath { .. }));
    }

    #[test]
    fn registry_is_bounded_by_wait_slots() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Notify);
        for i in 0..MAX_WATCHED_FILES {
            reg.register(&fs, format!("/exchange/f{i}.xml")).unwrap();
        }
        let err = reg.register(&fs, "/exchange/one-too-many.xml").unwrap_err();
        assert!(matches!(err, FileTriggerError::TooManyWatches { .. }));
        assert_eq!(reg.len(), MAX_WATCHED_FILES);
    }

    #[test]
    fn names_compare_without_case() {
        assert!(names_match("Prices.XML", "prices.xml"));
        assert!(names_match("Цены.xml", "ЦЕНЫ.XML"));
        assert!(!names_match("prices.xml", "prices.tmp"));
    }

    #[test]
    fn read_failure_flag_reports_transitions_only() {
        let fs = fs_with_dir();
        let mut reg = Registry::new(WatchMode::Polling);
        let id = reg.register(&fs, "/exchange/a.xml").unwrap();
        let file = reg.get_mut(id).unwrap();

        assert!(!file.note_read(true));
        assert!(file.note_read(false));
        assert!(!file.note_read(false));
        assert!(file.note_read(true));
    }
}
