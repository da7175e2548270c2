//! Analysis error types.

use burrow_streams::StreamError;
use thiserror::Error;

/// Why the analysis of a unit stopped short.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input refused before any analysis happened
    #[error("Rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    /// Nesting deeper than the configured maximum
    #[error("Nesting too deep at {path} (depth {depth})")]
    TooDeep { path: String, depth: u32 },

    /// The unit's stream failed; fields written so far are kept
    #[error("Stream error in {path}: {source}")]
    Stream { path: String, source: StreamError },

    /// The stream could not go back to the start of the unit
    #[error("Cannot rewind {path} to {position}")]
    NotRewindable { path: String, position: i64 },
}

impl AnalysisError {
    /// Numeric outcome: 1 when rejected up front, -2 on stream failure.
    pub fn code(&self) -> i32 {
        match self {
            AnalysisError::Rejected { .. } | AnalysisError::TooDeep { .. } => 1,
            AnalysisError::Stream { .. } | AnalysisError::NotRewindable { .. } => -2,
        }
    }
}

/// Failure of a single analyzer on a unit.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Data did not match the analyzer's format after all
    #[error("Format error: {0}")]
    Format(String),

    /// Reading the unit's stream failed
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// A nested unit could not be analyzed
    #[error("Nested unit failed: {0}")]
    Nested(Box<AnalysisError>),
}

impl From<AnalysisError> for AnalyzerError {
    fn from(e: AnalysisError) -> Self {
        AnalyzerError::Nested(Box::new(e))
    }
}
