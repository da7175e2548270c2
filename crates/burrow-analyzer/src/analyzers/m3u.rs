//! M3U playlists.

use crate::analyzer::{AnalyzerFactory, LineAnalyzer, LineAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

pub const SUBTYPE_FIELD: &str = "content.format_subtype";
pub const TRACK_COUNT_FIELD: &str = "media.track_count";
pub const LINKS_FIELD: &str = "content.links";

pub struct M3uLineFactory;

impl AnalyzerFactory for M3uLineFactory {
    fn name(&self) -> &'static str {
        "m3u"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(SUBTYPE_FIELD, FieldType::Text, 1);
        fields.register(TRACK_COUNT_FIELD, FieldType::Integer, 1);
        fields.register(LINKS_FIELD, FieldType::Text, 0);
    }
}

impl LineAnalyzerFactory for M3uLineFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn LineAnalyzer> {
        Box::new(M3uLineAnalyzer::default())
    }
}

#[derive(Debug, Default)]
pub struct M3uLineAnalyzer {
    active: bool,
    lines: usize,
    extended: bool,
    tracks: Vec<String>,
}

impl LineAnalyzer for M3uLineAnalyzer {
    fn name(&self) -> &'static str {
        "m3u"
    }

    fn start_analysis(&mut self, result: &AnalysisResult<'_>) {
        self.active = result
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("m3u") || ext.eq_ignore_ascii_case("m3u8"));
        self.lines = 0;
        self.extended = false;
        self.tracks.clear();
    }

    fn handle_line(&mut self, line: &str) {
        if !self.active {
            return;
        }
        let line = line.trim();
        if self.lines == 0 {
            self.extended = line.trim_start_matches('\u{feff}') == "#EXTM3U";
        }
        self.lines += 1;
        if !line.is_empty() && !line.starts_with('#') {
            self.tracks.push(line.to_string());
        }
    }

    fn is_ready_with_stream(&self) -> bool {
        !self.active
    }

    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, _complete: bool) {
        if !self.active || self.lines == 0 {
            return;
        }
        result.set_mime_type("audio/x-mpegurl");
        let subtype = if self.extended { "extended" } else { "simple" };
        result.add_field(SUBTYPE_FIELD, subtype);
        result.add_field(TRACK_COUNT_FIELD, self.tracks.len() as i64);
        for track in self.tracks.drain(..) {
            result.add_field(LINKS_FIELD, track);
        }
        self.active = false;
    }
}
