//! Indexing counters reported through the status call.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the scheduler worker.
#[derive(Debug, Default)]
pub struct IndexStats {
    units_indexed: AtomicU64,
    units_failed: AtomicU64,
    files_deleted: AtomicU64,
    events_processed: AtomicU64,
    commits: AtomicU64,
    last_commit: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`IndexStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub units_indexed: u64,
    pub units_failed: u64,
    pub files_deleted: u64,
    pub events_processed: u64,
    pub commits: u64,
    pub last_commit: Option<DateTime<Utc>>,
}

impl IndexStats {
    pub fn record_indexed(&self) {
        self.units_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self, count: usize) {
        self.files_deleted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: usize) {
        self.events_processed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        *self.last_commit.lock() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            units_indexed: self.units_indexed.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            last_commit: *self.last_commit.lock(),
        }
    }
}
