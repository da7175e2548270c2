//! MIME type detection from the first bytes of a unit.

use crate::analyzer::{AnalyzerFactory, EventAnalyzer, EventAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister};

/// Bytes inspected for magic numbers.
const SNIFF_LEN: usize = 8192;

pub struct MimeEventFactory;

impl AnalyzerFactory for MimeEventFactory {
    fn name(&self) -> &'static str {
        "mime"
    }

    // Writes the standard mimetype field only.
    fn register_fields(&self, _fields: &mut FieldRegister) {}
}

impl EventAnalyzerFactory for MimeEventFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn EventAnalyzer> {
        Box::new(MimeEventAnalyzer {
            head: Vec::with_capacity(SNIFF_LEN),
        })
    }
}

/// Sets the MIME type from magic numbers unless an end analyzer already did.
pub struct MimeEventAnalyzer {
    head: Vec<u8>,
}

impl EventAnalyzer for MimeEventAnalyzer {
    fn name(&self) -> &'static str {
        "mime"
    }

    fn start_analysis(&mut self, _result: &AnalysisResult<'_>) {
        self.head.clear();
    }

    fn handle_data(&mut self, data: &[u8]) {
        let room = SNIFF_LEN - self.head.len();
        self.head.extend_from_slice(&data[..data.len().min(room)]);
    }

    fn is_ready_with_stream(&self) -> bool {
        self.head.len() >= SNIFF_LEN
    }

    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, _complete: bool) {
        if result.mime_type().is_none() {
            if let Some(kind) = infer::get(&self.head) {
                result.set_mime_type(kind.mime_type());
            }
        }
        self.head.clear();
    }
}
