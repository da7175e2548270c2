//! Indexer error types.

use burrow_analyzer::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during indexing operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Invalid exclusion pattern
    #[error("Invalid exclude pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    /// Index store error
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Path not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::Serialization(e.to_string())
    }
}
