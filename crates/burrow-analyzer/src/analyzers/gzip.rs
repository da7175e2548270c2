//! gzip compressed files.

use burrow_streams::{is_gzip, GzipSource, Stream, StreamStatus};

use super::decoded_name;
use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister, FieldType};

const SUFFIXES: &[(&str, &str)] = &[(".tgz", ".tar"), (".svgz", ".svg"), (".gz", "")];

/// Original file name stored in the gzip header.
pub const ORIGINAL_NAME_FIELD: &str = "archive.original_name";

pub struct GzipEndFactory;

impl AnalyzerFactory for GzipEndFactory {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(ORIGINAL_NAME_FIELD, FieldType::Text, 1);
    }
}

impl EndAnalyzerFactory for GzipEndFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(GzipEndAnalyzer)
    }
}

/// Inflates the unit and analyzes the content as a nested unit named after
/// the stored file name, or the unit's name without its suffix.
pub struct GzipEndAnalyzer;

impl EndAnalyzer for GzipEndAnalyzer {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        is_gzip(header)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        let mut decoded = GzipSource::open(input)?;
        result.set_mime_type("application/gzip");

        let stored = decoded
            .source()
            .file_name()
            .and_then(|n| n.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let name = match stored {
            Some(stored) => {
                result.add_field(ORIGINAL_NAME_FIELD, stored.as_str());
                stored
            }
            None => decoded_name(result.file_name(), SUFFIXES),
        };
        let mtime = result.mtime();
        result.index_child(&name, mtime, &mut decoded)?;

        if decoded.status() == StreamStatus::Error {
            if let Some(e) = decoded.error() {
                return Err(AnalyzerError::Stream(e.clone()));
            }
        }
        Ok(())
    }
}
