//! Per-unit analysis context.
//!
//! An [`AnalysisResult`] collects the fields and text of one unit (a file or
//! an entry nested inside one) while the pipeline runs over it. Values are
//! buffered and handed to the [`IndexWriter`] when the result is dropped, so
//! a unit is either written completely or not at all.

use burrow_streams::Stream;
use tracing::{debug, warn};

use crate::index::{IndexWriter, UnitId};
use crate::{AnalysisError, AnalyzerConfig, FieldId, FieldRegister, FieldValue, StreamAnalyzer};

/// Fields and text gathered for one unit.
pub struct AnalysisResult<'a> {
    path: String,
    depth: u32,
    mtime: i64,
    values: Vec<(FieldId, FieldValue)>,
    text: String,
    mime_type: Option<String>,
    unit: Option<UnitId>,
    indexed: bool,
    analyzer: &'a mut StreamAnalyzer,
    writer: &'a dyn IndexWriter,
}

impl<'a> AnalysisResult<'a> {
    pub(crate) fn new(
        path: String,
        mtime: i64,
        depth: u32,
        analyzer: &'a mut StreamAnalyzer,
        writer: &'a dyn IndexWriter,
    ) -> Self {
        let unit = writer.start_unit(&path, mtime, depth);
        if unit.is_none() {
            debug!(path = %path, "Index writer declined unit");
        }
        Self {
            path,
            depth,
            mtime,
            values: Vec::new(),
            text: String::new(),
            mime_type: None,
            indexed: unit.is_some(),
            unit,
            analyzer,
            writer,
        }
    }

    /// Full path; nested units append their name to the parent's path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(i) => Some(&name[i + 1..]),
        }
    }

    /// Nesting depth, 0 for a file itself.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    /// Whether the index writer accepted this unit.
    pub fn was_indexed(&self) -> bool {
        self.indexed
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.analyzer.config()
    }

    pub fn fields(&self) -> &FieldRegister {
        self.analyzer.fields()
    }

    /// Values added so far, in order.
    pub fn values(&self) -> &[(FieldId, FieldValue)] {
        &self.values
    }

    /// Text added so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Set the MIME type, replacing any earlier one.
    pub fn set_mime_type(&mut self, mime_type: &str) {
        self.mime_type = Some(mime_type.to_string());
    }

    /// Add a value for a registered field.
    ///
    /// Values beyond the field's `max_occurs` are dropped.
    pub fn add_value(&mut self, field: FieldId, value: impl Into<FieldValue>) {
        if !self.indexed {
            return;
        }
        let max = self.analyzer.fields().info(field).max_occurs;
        if max > 0 && self.values.iter().filter(|(f, _)| *f == field).count() >= max {
            debug!(
                path = %self.path,
                field = self.analyzer.fields().name(field),
                "Dropping value beyond max occurrences"
            );
            return;
        }
        self.values.push((field, value.into()));
    }

    /// Add a value for the field registered as `name`.
    pub fn add_field(&mut self, name: &str, value: impl Into<FieldValue>) {
        match self.analyzer.fields().lookup(name) {
            Some(field) => self.add_value(field, value),
            None => warn!(field = name, "Value for unregistered field ignored"),
        }
    }

    /// Append extracted text, up to the configured per-unit limit.
    pub fn add_text(&mut self, text: &str) {
        if !self.indexed || text.is_empty() {
            return;
        }
        let limit = self.analyzer.config().max_text_bytes;
        let separate = !self.text.is_empty() && !self.text.ends_with(char::is_whitespace);
        let room = limit.saturating_sub(self.text.len() + usize::from(separate));
        let mut end = text.len().min(room);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return;
        }
        if separate {
            self.text.push(' ');
        }
        self.text.push_str(&text[..end]);
    }

    /// Analyze an entry nested in this unit, named `name`, whose data is
    /// `input`.
    pub fn index_child(
        &mut self,
        name: &str,
        mtime: i64,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalysisError> {
        let depth = self.depth + 1;
        let path = format!("{}/{}", self.path, name);
        if depth > self.analyzer.config().max_depth {
            warn!(path = %path, depth, "Nesting limit reached, entry skipped");
            return Err(AnalysisError::TooDeep { path, depth });
        }

        let mut child = AnalysisResult::new(path, mtime, depth, &mut *self.analyzer, self.writer);
        StreamAnalyzer::analyze_unit(&mut child, Some(input))
    }

    pub(crate) fn analyzer_mut(&mut self) -> &mut StreamAnalyzer {
        self.analyzer
    }

    /// Hand everything to the writer and finish the unit.
    fn flush(&mut self) {
        let Some(unit) = self.unit.take() else {
            return;
        };
        if let Some(mime_type) = self.mime_type.take() {
            let field = self.analyzer.fields().mimetype_field();
            self.values.push((field, FieldValue::Text(mime_type)));
        }
        let fields = self.analyzer.fields();
        for (field, value) in &self.values {
            self.writer.add_field(unit, fields.name(*field), value);
        }
        if !self.text.is_empty() {
            self.writer.add_text(unit, &self.text);
        }
        self.writer.finish_unit(unit);
    }
}

impl Drop for AnalysisResult<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingWriter;
    use crate::{AnalyzerRegistry, FieldType};

    fn analyzer(config: AnalyzerConfig) -> StreamAnalyzer {
        let mut registry = AnalyzerRegistry::new(config);
        registry.register_end(Box::new(crate::analyzers::text::TextEndFactory));
        StreamAnalyzer::new(registry)
    }

    #[test]
    fn test_values_are_flushed_on_drop() {
        let writer = RecordingWriter::default();
        let mut analyzer = analyzer(AnalyzerConfig::default());
        {
            let mut result = AnalysisResult::new("/a/b.txt".into(), 5, 0, &mut analyzer, &writer);
            assert_eq!(result.file_name(), "b.txt");
            assert_eq!(result.extension(), Some("txt"));
            result.set_mime_type("text/plain");
            result.set_mime_type("text/markdown");
            result.add_field("text.line_count", 3i64);
            result.add_field("text.line_count", 4i64);
            result.add_field("no.such.field", "x");
            result.add_text("first");
            result.add_text("second");
            assert_eq!(result.text(), "first second");
        }

        let unit = writer.unit("/a/b.txt").unwrap();
        assert!(unit.finished);
        assert_eq!(
            unit.fields,
            [
                ("text.line_count".to_string(), FieldValue::Integer(3)),
                ("mimetype".to_string(), FieldValue::Text("text/markdown".into())),
            ]
        );
        assert_eq!(unit.text, "first second");
    }

    #[test]
    fn test_text_limit_respects_char_boundaries() {
        let writer = RecordingWriter::default();
        let mut analyzer = analyzer(AnalyzerConfig {
            max_text_bytes: 5,
            ..Default::default()
        });
        let mut result = AnalysisResult::new("/t".into(), 0, 0, &mut analyzer, &writer);
        result.add_text("ab\u{e9}\u{e9}");
        assert_eq!(result.text(), "ab\u{e9}");
        result.add_text("more");
        assert_eq!(result.text(), "ab\u{e9}");
    }

    #[test]
    fn test_unlimited_field() {
        let writer = RecordingWriter::default();
        let mut registry = AnalyzerRegistry::new(AnalyzerConfig::default());
        registry.register_line(Box::new(crate::analyzers::m3u::M3uLineFactory));
        let mut analyzer = StreamAnalyzer::new(registry);

        let mut result = AnalysisResult::new("/p.m3u".into(), 0, 0, &mut analyzer, &writer);
        let links = result.fields().lookup("content.links").unwrap();
        assert_eq!(result.fields().info(links).field_type, FieldType::Text);
        for i in 0..5 {
            result.add_value(links, format!("track{}.mp3", i));
        }
        assert_eq!(result.values().len(), 5);
    }

    #[test]
    fn test_declined_unit_ignores_values() {
        let writer = RecordingWriter {
            decline: Some("/t".to_string()),
            ..Default::default()
        };
        let mut analyzer = analyzer(AnalyzerConfig::default());
        let mut result = AnalysisResult::new("/t".into(), 0, 0, &mut analyzer, &writer);
        assert!(!result.was_indexed());
        result.add_field("text.line_count", 1i64);
        result.add_text("ignored");
        assert!(result.values().is_empty());
        assert!(result.text().is_empty());
    }

    #[test]
    fn test_child_beyond_max_depth() {
        let writer = RecordingWriter::default();
        let mut analyzer = analyzer(AnalyzerConfig {
            max_depth: 1,
            ..Default::default()
        });
        let mut result = AnalysisResult::new("/a".into(), 0, 1, &mut analyzer, &writer);
        let mut input = burrow_streams::MemoryStream::from_bytes(b"x".to_vec());
        let err = result.index_child("b", 0, &mut input).unwrap_err();
        assert!(matches!(err, AnalysisError::TooDeep { ref path, depth: 2 } if path == "/a/b"));
    }
}
