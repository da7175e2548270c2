//! Formats converted to text by external programs.
//!
//! Each configured helper names a magic prefix and a command line. The unit's
//! data is piped to the command and its output becomes the unit's text.

use burrow_streams::{ProcessSource, Stream};

use super::read_limited;
use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister, FieldType, HelperConfig};

/// Name of the helper that produced the text.
pub const HELPER_FIELD: &str = "helper.name";

pub struct HelperEndFactory;

impl AnalyzerFactory for HelperEndFactory {
    fn name(&self) -> &'static str {
        "helper"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(HELPER_FIELD, FieldType::Text, 1);
    }

    fn wants(&self, config: &AnalyzerConfig) -> bool {
        !config.is_disabled(self.name()) && !config.helpers.is_empty()
    }
}

impl EndAnalyzerFactory for HelperEndFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(HelperEndAnalyzer {
            helpers: config.helpers.clone(),
            max_text: config.max_text_bytes,
        })
    }
}

pub struct HelperEndAnalyzer {
    helpers: Vec<HelperConfig>,
    max_text: usize,
}

impl HelperEndAnalyzer {
    fn find(&self, header: &[u8]) -> Option<&HelperConfig> {
        self.helpers
            .iter()
            .find(|h| !h.magic.is_empty() && header.starts_with(h.magic.as_bytes()))
    }
}

impl EndAnalyzer for HelperEndAnalyzer {
    fn name(&self) -> &'static str {
        "helper"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        self.find(header).is_some()
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        let start = input.position();
        let header = input.read(1, 64)?.to_vec();
        if input.reset(start) != start {
            return Err(AnalyzerError::Format("cannot rewind for helper".to_string()));
        }
        let helper = self
            .find(&header)
            .cloned()
            .ok_or_else(|| AnalyzerError::Format("no helper for data".to_string()))?;

        let mut output = ProcessSource::spawn(&helper.command, Some(input))?;
        let (data, _) = read_limited(&mut output, self.max_text)?;
        result.add_field(HELPER_FIELD, helper.name.as_str());
        result.add_text(&String::from_utf8_lossy(&data));
        Ok(())
    }
}
