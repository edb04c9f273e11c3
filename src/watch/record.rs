// src/watch/record.rs

//! Wire format for batches of directory-change records.
//!
//! A batch is a chain of variable-length records in one byte buffer:
//!
//! ```text
//! offset  size  field
//! 0       4     next_offset  (u32 LE, relative to this record; 0 = last)
//! 4       4     action       (u32 LE)
//! 8       4     name_len     (u32 LE, bytes)
//! 12      n     name         (UTF-8, not NUL-terminated)
//!               padding to a 4-byte boundary
//! ```
//!
//! [`BatchEncoder`] produces batches; [`decode`] walks them lazily and checks
//! every header and name against the buffer bounds before touching it.

use std::borrow::Cow;

use thiserror::Error;

/// Size of the fixed record header.
pub const RECORD_HEADER_LEN: usize = 12;

const ALIGN: usize = 4;

/// What happened to the named entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Added,
    Removed,
    Modified,
    RenamedFrom,
    RenamedTo,
    Unknown(u32),
}

impl Action {
    pub fn code(self) -> u32 {
        match self {
            Action::Added => 1,
            Action::Removed => 2,
            Action::Modified => 3,
            Action::RenamedFrom => 4,
            Action::RenamedTo => 5,
            Action::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Action::Added,
            2 => Action::Removed,
            3 => Action::Modified,
            4 => Action::RenamedFrom,
            5 => Action::RenamedTo,
            other => Action::Unknown(other),
        }
    }
}

/// One decoded record, borrowing its name from the batch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub action: Action,
    name: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn name_bytes(&self) -> &'a [u8] {
        self.name
    }

    pub fn name(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record at offset {offset} has a truncated header ({available} bytes left)")]
    TruncatedHeader { offset: usize, available: usize },

    #[error(
        "record at offset {offset} claims a {claimed}-byte name but only {available} bytes remain"
    )]
    NameOutOfBounds {
        offset: usize,
        claimed: usize,
        available: usize,
    },

    #[error("record at offset {offset} links to invalid next offset {next}")]
    BadNextOffset { offset: usize, next: usize },
}

/// Walk the records in `buf`.
pub fn decode(buf: &[u8]) -> RecordIter<'_> {
    RecordIter {
        buf,
        offset: 0,
        done: buf.is_empty(),
    }
}

/// Lazy, bounds-checked iterator over a record batch.
///
/// Yields `Err` at most once, for the first malformed record, and then ends.
#[derive(Debug, Clone)]
pub struct RecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

impl<'a> RecordIter<'a> {
    fn fail(&mut self, err: DecodeError) -> Option<Result<Record<'a>, DecodeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let offset = self.offset;
        let rest = match self.buf.get(offset..) {
            Some(rest) => rest,
            None => {
                return self.fail(DecodeError::BadNextOffset {
                    offset,
                    next: offset,
                });
            }
        };

        let header = (read_u32(rest, 0), read_u32(rest, 4), read_u32(rest, 8));
        let (next, action, name_len) = match header {
            (Some(next), Some(action), Some(len)) => (next as usize, action, len as usize),
            _ => {
                return self.fail(DecodeError::TruncatedHeader {
                    offset,
                    available: rest.len(),
                });
            }
        };

        let available = rest.len() - RECORD_HEADER_LEN;
        let name_end = match RECORD_HEADER_LEN.checked_add(name_len) {
            Some(end) if end <= rest.len() => end,
            _ => {
                return self.fail(DecodeError::NameOutOfBounds {
                    offset,
                    claimed: name_len,
                    available,
                });
            }
        };
        let name = &rest[RECORD_HEADER_LEN..name_end];

        if next == 0 {
            self.done = true;
        } else if next < name_end || next > rest.len() {
            return self.fail(DecodeError::BadNextOffset { offset, next });
        } else {
            self.offset = offset + next;
        }

        Some(Ok(Record {
            action: Action::from_code(action),
            name,
        }))
    }
}

fn padded_len(name_len: usize) -> usize {
    (RECORD_HEADER_LEN + name_len).div_ceil(ALIGN) * ALIGN
}

const MAX_BATCH_CAPACITY: usize = u32::MAX as usize;

/// Accumulates records into a bounded batch buffer.
///
/// A record that does not fit is dropped and the batch is flagged as
/// overflowed; the consumer then has to assume it missed something.
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    buf: Vec<u8>,
    last_start: Option<usize>,
    capacity: usize,
    overflowed: bool,
}

impl BatchEncoder {
    /// `capacity` is clamped so every record offset fits the u32 link field.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            last_start: None,
            capacity: capacity.min(MAX_BATCH_CAPACITY),
            overflowed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && !self.overflowed
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Mark the batch as lossy without adding a record.
    pub fn mark_overflow(&mut self) {
        self.overflowed = true;
    }

    /// Append a record; returns false if it did not fit.
    pub fn push(&mut self, action: Action, name: &[u8]) -> bool {
        let len = padded_len(name.len());
        let name_len = match u32::try_from(name.len()) {
            Ok(n) => n,
            Err(_) => {
                self.overflowed = true;
                return false;
            }
        };
        if self.buf.len() + len > self.capacity {
            self.overflowed = true;
            return false;
        }

        let start = self.buf.len();
        if let Some(prev) = self.last_start {
            let Ok(link) = u32::try_from(start - prev) else {
                self.overflowed = true;
                return false;
            };
            self.buf[prev..prev + 4].copy_from_slice(&link.to_le_bytes());
        }

        self.buf.extend_from_slice(&0u32.to_le_bytes());
        self.buf.extend_from_slice(&action.code().to_le_bytes());
        self.buf.extend_from_slice(&name_len.to_le_bytes());
        self.buf.extend_from_slice(name);
        self.buf.resize(start + len, 0);
        self.last_start = Some(start);
        true
    }

    /// Move the batch into `out` (cleared first) and reset the encoder.
    ///
    /// Returns whether the batch had overflowed.
    pub fn take_into(&mut self, out: &mut Vec<u8>) -> bool {
        out.clear();
        out.extend_from_slice(&self.buf);
        self.buf.clear();
        self.last_start = None;
        std::mem::take(&mut self.overflowed)
    }
}
