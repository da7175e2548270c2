//! Plain UTF-8 text.

use burrow_streams::{Stream, Utf8Source};

use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister, FieldType};

/// Number of lines in the text.
pub const LINE_COUNT_FIELD: &str = "text.line_count";

const CHUNK: usize = 4096;

pub struct TextEndFactory;

impl AnalyzerFactory for TextEndFactory {
    fn name(&self) -> &'static str {
        "text"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(LINE_COUNT_FIELD, FieldType::Integer, 1);
    }
}

impl EndAnalyzerFactory for TextEndFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(TextEndAnalyzer::default())
    }
}

/// Accepts data that decodes as UTF-8 without NUL bytes.
#[derive(Debug, Default)]
pub struct TextEndAnalyzer {
    text: String,
}

impl EndAnalyzer for TextEndAnalyzer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        if header.contains(&0) {
            return false;
        }
        match std::str::from_utf8(header) {
            Ok(_) => true,
            // A character cut off by the end of the header.
            Err(e) => e.error_len().is_none(),
        }
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        let limit = result.config().max_text_bytes;
        self.text.clear();
        let mut lines = 0i64;
        let mut last = '\n';

        let mut chars = Utf8Source::open(input);
        loop {
            let chunk = chars.read(1, CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            for &c in chunk {
                if c == '\0' {
                    return Err(AnalyzerError::Format("NUL in text".to_string()));
                }
                if c == '\n' {
                    lines += 1;
                }
                if self.text.len() + c.len_utf8() <= limit {
                    self.text.push(c);
                }
                last = c;
            }
        }
        if last != '\n' {
            lines += 1;
        }

        if result.mime_type().is_none() {
            result.set_mime_type("text/plain");
        }
        result.add_field(LINE_COUNT_FIELD, lines);
        result.add_text(&self.text);
        self.text.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_header() {
        let text = TextEndAnalyzer::default();
        assert!(text.check_header(b"hello world\n"));
        assert!(text.check_header("caf\u{e9}".as_bytes()));
        // Cut in the middle of a two-byte character.
        assert!(text.check_header(&"caf\u{e9}".as_bytes()[..4]));
        assert!(!text.check_header(b"bin\0ary"));
        assert!(!text.check_header(b"\xff\xfe"));
    }
}
