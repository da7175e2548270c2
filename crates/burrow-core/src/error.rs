//! Core error types for burrow.

use burrow_indexer::IndexerError;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Indexed directories must be absolute
    #[error("Invalid directory: {0}")]
    InvalidPath(String),

    /// Indexer failure
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),
}
