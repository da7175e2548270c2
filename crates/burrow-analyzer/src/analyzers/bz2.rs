//! bzip2 compressed files.

use burrow_streams::{is_bzip2, Bz2Source, Stream, StreamStatus};

use super::decoded_name;
use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister};

const SUFFIXES: &[(&str, &str)] = &[(".tbz2", ".tar"), (".tbz", ".tar"), (".bz2", ""), (".bz", "")];

pub struct Bz2EndFactory;

impl AnalyzerFactory for Bz2EndFactory {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn register_fields(&self, _fields: &mut FieldRegister) {}
}

impl EndAnalyzerFactory for Bz2EndFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(Bz2EndAnalyzer)
    }
}

/// Decompresses the unit and analyzes the content as a nested unit.
pub struct Bz2EndAnalyzer;

impl EndAnalyzer for Bz2EndAnalyzer {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        is_bzip2(header)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        let mut decoded = Bz2Source::open(input)?;
        result.set_mime_type("application/x-bzip2");

        let name = decoded_name(result.file_name(), SUFFIXES);
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
