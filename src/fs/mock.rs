// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File {
        content: Vec<u8>,
        modified: SystemTime,
        /// Reads fail after this many bytes have been returned.
        fail_after: Option<usize>,
    },
    Dir,
}

/// In-memory filesystem for tests.
///
/// Modification times are explicit: `add_file` stamps a fresh time from an
/// internal clock, `set_contents` keeps the old one, and `touch` /
/// `set_modified` move it.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<u64>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.add_dir("/");
        fs
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_time(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        *clock += 1;
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + *clock)
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        let mut current = Some(path.as_ref());
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            entries.entry(dir.to_path_buf()).or_insert(MockEntry::Dir);
            current = dir.parent();
        }
    }

    /// Create or replace a file with a fresh modification time.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        let modified = self.next_time();
        self.lock().insert(
            path.to_path_buf(),
            MockEntry::File {
                content: content.into(),
                modified,
                fail_after: None,
            },
        );
    }

    /// Replace a file's content without touching its modification time.
    pub fn set_contents(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        if let Some(MockEntry::File { content: c, .. }) = self.lock().get_mut(path.as_ref()) {
            *c = content.into();
        }
    }

    /// Advance a file's modification time; returns the new time.
    pub fn touch(&self, path: impl AsRef<Path>) -> Option<SystemTime> {
        let now = self.next_time();
        match self.lock().get_mut(path.as_ref()) {
            Some(MockEntry::File { modified, .. }) => {
                *modified = now;
                Some(now)
            }
            _ => None,
        }
    }

    pub fn set_modified(&self, path: impl AsRef<Path>, time: SystemTime) {
        if let Some(MockEntry::File { modified, .. }) = self.lock().get_mut(path.as_ref()) {
            *modified = time;
        }
    }

    /// Make reads of `path` fail once `bytes` bytes have been returned.
    pub fn fail_reads_after(&self, path: impl AsRef<Path>, bytes: Option<usize>) {
        if let Some(MockEntry::File { fail_after, .. }) = self.lock().get_mut(path.as_ref()) {
            *fail_after = bytes;
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.lock().remove(path.as_ref());
    }
}

/// Reader that hands out `data` and then errors at `fail_after`.
struct FlakyReader {
    data: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for FlakyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::other("simulated device error"));
        }
        let limit = buf.len().min(self.remaining);
        let n = self.data.read(&mut buf[..limit])?;
        if n == 0 {
            return Ok(0);
        }
        self.remaining -= n;
        Ok(n)
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let entries = self.lock();
        match entries.get(path) {
            Some(MockEntry::File {
                content,
                fail_after: None,
                ..
            }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::File {
                content,
                fail_after: Some(limit),
                ..
            }) => Ok(Box::new(FlakyReader {
                data: Cursor::new(content.clone()),
                remaining: *limit,
            })),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        match self.lock().get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Tests use absolute paths, so they are already canonical.
        if self.lock().contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }
}
