//! Contracts with the index store.
//!
//! The analysis pipeline writes through [`IndexWriter`]; the scheduler reads
//! the stored file table through [`IndexReader`]. Implementations serialize
//! calls themselves: every method takes `&self` and may be called while a
//! reader is used from another thread.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::FieldValue;

/// Writer-assigned handle for a unit being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

/// Errors reported by an index store.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O error while persisting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store rejected the operation
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Write side of an index store.
pub trait IndexWriter: Send + Sync {
    /// Begin a unit. `None` means the store declined it; field writes for
    /// that unit are then skipped.
    fn start_unit(&self, path: &str, mtime: i64, depth: u32) -> Option<UnitId>;

    /// Attach a field value to a started unit.
    fn add_field(&self, unit: UnitId, name: &str, value: &FieldValue);

    /// Attach extracted text to a started unit.
    fn add_text(&self, unit: UnitId, text: &str);

    /// Complete a unit. Only completed units become visible on commit.
    fn finish_unit(&self, unit: UnitId);

    /// Remove every unit whose path equals one of `paths` or lies below it.
    fn delete_entries(&self, paths: &[String]) -> Result<(), IndexError>;

    /// Make completed units and deletions visible to readers.
    fn commit(&self) -> Result<(), IndexError>;

    /// Completed units waiting for the next commit.
    fn items_in_cache(&self) -> usize;

    /// Compact the store after a full pass.
    fn optimize(&self) -> Result<(), IndexError>;
}

/// A stored unit returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub path: String,
    pub mtime: i64,
    pub depth: u32,
    pub fields: Vec<(String, FieldValue)>,
    /// Beginning of the unit's text
    pub fragment: String,
}

impl IndexedDocument {
    /// First value of `name`, if present.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Conjunction of case-insensitive terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<String>,
}

impl Query {
    /// Split `text` on whitespace into terms.
    pub fn parse(text: &str) -> Self {
        Self {
            terms: text.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether every term occurs in at least one of `haystacks`.
    ///
    /// An empty query matches everything.
    pub fn matches<'h>(&self, haystacks: impl Iterator<Item = &'h str>) -> bool {
        let lowered: Vec<String> = haystacks.map(str::to_lowercase).collect();
        self.terms
            .iter()
            .all(|term| lowered.iter().any(|h| h.contains(term.as_str())))
    }
}

/// Read side of an index store.
pub trait IndexReader: Send + Sync {
    /// Path and modification time of every committed unit at exactly
    /// `depth` (0 for the files themselves).
    fn get_files(&self, depth: u32) -> Result<BTreeMap<String, i64>, IndexError>;

    /// Number of committed units matching `query`.
    fn count_hits(&self, query: &Query) -> usize;

    /// Matching units ordered by path, skipping `offset` and returning at
    /// most `max`.
    fn query(&self, query: &Query, max: usize, offset: usize) -> Vec<IndexedDocument>;

    /// Number of committed units.
    fn count_documents(&self) -> usize;
}

/// Gives access to the two sides of a store.
pub trait IndexManager: Send + Sync {
    fn writer(&self) -> &dyn IndexWriter;
    fn reader(&self) -> &dyn IndexReader;
}
