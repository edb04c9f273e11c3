// src/logging.rs

//! Logging for `filetrigger`.
//!
//! Two layers live here:
//!
//! - [`init_logging`] installs the global `tracing` subscriber. The level is
//!   taken from `--log-level`, then `FILETRIGGER_LOG`, then defaults to `info`.
//!   Logs go to STDERR.
//! - [`EventSink`] is the structured event log the engine reports its
//!   decisions to (detection outcomes, dispatch attempts, fatal conditions).
//!   Entries carry a severity, a category and an event id, the shape service
//!   hosts expect from an event log. [`TracingSink`] forwards them to
//!   `tracing`; [`MemorySink`] keeps them for inspection.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("FILETRIGGER_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    // Keep stdout for the dispatched script.
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// Severity of a structured event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Information,
    Warning,
    Error,
}

/// Event categories.
pub mod category {
    /// Normal operation: registrations, detected changes, dispatches.
    pub const GENERAL: u16 = 1;
    /// Failures.
    pub const FAILURE: u16 = 2;
    /// Lifecycle notices such as stopping.
    pub const LIFECYCLE: u16 = 3;
}

/// Event id shared by all engine entries.
pub const ENGINE_EVENT_ID: u32 = 1000;

/// One structured event log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub category: u16,
    pub id: u32,
    pub message: String,
}

impl LogEntry {
    pub fn new(severity: Severity, category: u16, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            id: ENGINE_EVENT_ID,
            message: message.into(),
        }
    }
}

/// Destination for structured engine events.
///
/// The sink performs no retries or buffering on behalf of the engine; what
/// it does with an entry is up to the implementation.
pub trait EventSink: Send + Sync {
    fn report(&self, entry: LogEntry);

    fn success(&self, message: String) {
        self.report(LogEntry::new(Severity::Success, category::GENERAL, message));
    }

    fn information(&self, message: String) {
        self.report(LogEntry::new(Severity::Information, category::GENERAL, message));
    }

    fn warning(&self, message: String) {
        self.report(LogEntry::new(Severity::Warning, category::LIFECYCLE, message));
    }

    fn error(&self, message: String) {
        self.report(LogEntry::new(Severity::Error, category::FAILURE, message));
    }
}

/// Production sink: every entry becomes a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn report(&self, entry: LogEntry) {
        let LogEntry {
            severity,
            category,
            id,
            message,
        } = entry;

        match severity {
            Severity::Success | Severity::Information => {
                tracing::info!(?severity, category, event_id = id, "{message}")
            }
            Severity::Warning => tracing::warn!(category, event_id = id, "{message}"),
            Severity::Error => tracing::error!(category, event_id = id, "{message}"),
        }
    }
}

/// Sink that keeps every entry in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries reported so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Whether an entry with `severity` whose message contains `needle` exists.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.severity == severity && e.message.contains(needle))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries().iter().filter(|e| e.severity == severity).count()
    }
}

impl EventSink for MemorySink {
    fn report(&self, entry: LogEntry) {
        tracing::debug!(?entry, "event sink entry");
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
