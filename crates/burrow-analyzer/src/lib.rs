//! Burrow Analyzer
//!
//! This crate turns byte streams into index units:
//! - Analyzer capabilities (through, end, event, line and SAX analyzers)
//! - An ordered registry of analyzer factories with a shared field register
//! - Recursive analysis of nested units such as archive entries
//! - The index writer and reader contracts that results are written to

pub mod analyzer;
pub mod analyzers;
mod config;
mod error;
mod fields;
mod index;
mod registry;
mod result;
mod stream_analyzer;

#[cfg(test)]
mod testing;

pub use analyzer::{
    AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory, EventAnalyzer, EventAnalyzerFactory,
    LineAnalyzer, LineAnalyzerFactory, SaxAnalyzer, SaxAnalyzerFactory, ThroughAnalyzer,
    ThroughAnalyzerFactory,
};
pub use config::{AnalyzerConfig, HelperConfig};
pub use error::{AnalysisError, AnalyzerError};
pub use fields::{FieldId, FieldInfo, FieldRegister, FieldType, FieldValue, MIMETYPE_FIELD, SIZE_FIELD};
pub use index::{
    IndexError, IndexManager, IndexReader, IndexWriter, IndexedDocument, Query, UnitId,
};
pub use registry::{AnalyzerKind, AnalyzerRegistry};
pub use result::AnalysisResult;
pub use stream_analyzer::StreamAnalyzer;
