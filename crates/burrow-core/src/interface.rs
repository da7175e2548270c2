//! Client-facing surface of the daemon.
//!
//! [`Interface`] answers queries from the index store and controls the
//! scheduler. It carries no transport; a server layer maps its methods onto
//! whatever protocol it speaks.

use burrow_analyzer::{IndexManager, IndexedDocument, Query};
use burrow_indexer::SchedulerHandle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::CoreError;

type DirectoryListener = Box<dyn Fn(&BTreeSet<String>, &BTreeSet<String>) + Send + Sync>;

/// Query and control operations over one index.
pub struct Interface {
    index: Arc<dyn IndexManager>,
    scheduler: SchedulerHandle,
    started: DateTime<Utc>,
    listener: Mutex<Option<DirectoryListener>>,
}

impl Interface {
    pub fn new(index: Arc<dyn IndexManager>, scheduler: SchedulerHandle) -> Self {
        Self {
            index,
            scheduler,
            started: Utc::now(),
            listener: Mutex::new(None),
        }
    }

    /// Call `listener(old, new)` whenever the indexed directories change.
    pub fn on_directories_changed<F>(&self, listener: F)
    where
        F: Fn(&BTreeSet<String>, &BTreeSet<String>) + Send + Sync + 'static,
    {
        *self.listener.lock() = Some(Box::new(listener));
    }

    /// Number of stored units matching `query`.
    pub fn count_hits(&self, query: &str) -> usize {
        self.index.reader().count_hits(&Query::parse(query))
    }

    /// Matching units ordered by path.
    pub fn query(&self, query: &str, max: usize, offset: usize) -> Vec<IndexedDocument> {
        self.index
            .reader()
            .query(&Query::parse(query), max, offset)
    }

    /// Scheduler state, store size and indexing counters.
    pub fn get_status(&self) -> BTreeMap<String, String> {
        let stats = self.scheduler.stats().snapshot();
        let mut status = BTreeMap::new();
        status.insert("status".to_string(), self.scheduler.state().as_str().to_string());
        status.insert(
            "documents".to_string(),
            self.index.reader().count_documents().to_string(),
        );
        status.insert("queue_size".to_string(), self.scheduler.pending().to_string());
        status.insert(
            "events_queued".to_string(),
            self.scheduler.queue().len().to_string(),
        );
        status.insert("units_indexed".to_string(), stats.units_indexed.to_string());
        status.insert("units_failed".to_string(), stats.units_failed.to_string());
        status.insert("commits".to_string(), stats.commits.to_string());
        status.insert(
            "last_commit".to_string(),
            stats
                .last_commit
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
        status.insert(
            "indexed_directories".to_string(),
            self.scheduler.indexed_directories().len().to_string(),
        );
        status.insert(
            "uptime_secs".to_string(),
            (Utc::now() - self.started).num_seconds().to_string(),
        );
        status
    }

    /// Request a full indexing pass.
    pub fn start_indexing(&self) -> bool {
        self.scheduler.start_indexing()
    }

    /// Interrupt the running pass.
    pub fn stop_indexing(&self) -> bool {
        self.scheduler.stop_indexing()
    }

    pub fn get_indexed_directories(&self) -> BTreeSet<String> {
        self.scheduler.indexed_directories()
    }

    /// Replace the indexed directories. Every entry must be absolute; the
    /// stored set is normalized and returned.
    pub fn set_indexed_directories<I, S>(&self, dirs: I) -> Result<BTreeSet<String>, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dirs: Vec<String> = dirs.into_iter().map(|d| d.as_ref().to_string()).collect();
        if let Some(bad) = dirs.iter().find(|d| !Path::new(d).is_absolute()) {
            return Err(CoreError::InvalidPath(bad.clone()));
        }

        let old = self.scheduler.indexed_directories();
        let new = self.scheduler.set_indexed_directories(&dirs);
        if old != new {
            info!(count = new.len(), "Indexed directories changed");
            if let Some(listener) = self.listener.lock().as_ref() {
                listener(&old, &new);
            }
        }
        Ok(new)
    }
}
