// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Keeping the registry of watched files and their per-file baselines.
//! - Content hashing for the polling strategy.
//! - Directory subscriptions and the change-record wire format for the
//!   notification strategy.
//!
//! It does **not** decide whether a change is real or run anything; it only
//! turns filesystem activity into [`ChangeEvent`](crate::engine::ChangeEvent)
//! candidates.

pub mod hash;
pub mod notification;
pub mod polling;
pub mod record;
pub mod registry;
pub mod strategy;

pub use hash::{compute_file_digest, Digest, HASH_BLOCK_SIZE};
pub use notification::{collect_changes, NotificationStrategy, RecordFeed, NOTIFY_BUFFER_SIZE};
pub use polling::PollingStrategy;
pub use record::{decode, Action, BatchEncoder, DecodeError, Record};
pub use registry::{Baseline, Registry, WatchId, WatchedFile, MAX_WATCHED_FILES};
pub use strategy::{DetectionStrategy, Readiness};
