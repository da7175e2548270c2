//! Burrow Indexer
//!
//! This crate keeps an index store current with the file system:
//! - The index scheduler, reconciling stored files against a directory walk
//! - A change event queue fed by a debounced file watcher
//! - Exclusion filters for hidden paths and gitignore-style patterns
//! - An in-memory index store with atomic JSON snapshots
//! - Indexing statistics for status reporting

mod error;
pub mod filter;
pub mod lister;
pub mod queue;
pub mod scheduler;
mod stats;
pub mod storage;
pub mod watcher;

pub use error::IndexerError;
pub use filter::FilterManager;
pub use lister::{FileLister, ListedFile, WalkLister};
pub use queue::{EventQueue, FileEvent};
pub use scheduler::{
    normalize_directories, IndexScheduler, SchedulerHandle, SchedulerOptions, SchedulerState,
};
pub use stats::{IndexStats, StatsSnapshot};
pub use storage::MemoryIndex;
pub use watcher::{FileWatcher, WatcherOptions};
