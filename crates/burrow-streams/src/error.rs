//! Stream error types.

use thiserror::Error;

/// Errors reported by streams.
///
/// A stream that failed keeps reporting the same error on every later call,
/// so the type is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// More data was produced than the declared size allows
    #[error("Stream is longer than its declared size of {size} bytes")]
    TooLong { size: i64 },

    /// Data ended in the middle of a structure
    #[error("Unexpected end of stream: {0}")]
    UnexpectedEof(String),

    /// Decoder rejected the data
    #[error("Decode error: {0}")]
    Decode(String),

    /// Data does not carry the expected format signature
    #[error("Format error: {0}")]
    Format(String),

    /// A reset could not reach the requested position
    #[error("Could not rewind stream to position {0}")]
    Rewind(i64),

    /// External helper process failed
    #[error("Helper process failed: {0}")]
    Process(String),
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Io(e.to_string())
    }
}
