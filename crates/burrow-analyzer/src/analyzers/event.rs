//! Dispatch of raw data, lines and markup to the event, line and SAX
//! analyzers.
//!
//! One [`EventThroughAnalyzer`] per depth wraps the unit's stream and feeds
//! every byte the first time it is read. Lines are split as data arrives.
//! Markup is collected up to a limit and parsed when the unit is released.

use std::sync::Arc;

use burrow_streams::{Stream, StreamError, StreamStatus};
use parking_lot::Mutex;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use super::skip_bom_and_space;
use crate::analyzer::{EventAnalyzer, LineAnalyzer, SaxAnalyzer, ThroughAnalyzer};
use crate::AnalysisResult;

/// Longest line handed to line analyzers; the rest of the line is dropped.
pub const MAX_LINE: usize = 64 * 1024;

/// Whether the unit looks like markup.
#[derive(Debug, PartialEq, Eq)]
enum Markup {
    /// Only whitespace seen so far
    Undecided,
    Collecting,
    /// Collected up to the limit
    Full,
    /// Not markup, or no SAX analyzers
    Off,
}

struct EventDispatch {
    events: Vec<Box<dyn EventAnalyzer>>,
    lines: Vec<Box<dyn LineAnalyzer>>,
    sax: Vec<Box<dyn SaxAnalyzer>>,
    markup_limit: usize,
    seen: i64,
    complete: bool,
    line: Vec<u8>,
    markup: Markup,
    markup_data: Vec<u8>,
}

impl EventDispatch {
    fn start(&mut self, result: &AnalysisResult<'_>, position: i64) {
        self.seen = position;
        self.complete = false;
        self.line.clear();
        self.markup_data.clear();
        self.markup = if self.sax.is_empty() {
            Markup::Off
        } else {
            Markup::Undecided
        };
        for event in self.events.iter_mut() {
            event.start_analysis(result);
        }
        for line in self.lines.iter_mut() {
            line.start_analysis(result);
        }
        for sax in self.sax.iter_mut() {
            sax.start_analysis(result);
        }
    }

    /// Take data read at `pos`; only bytes past `seen` are new.
    fn observe(&mut self, pos: i64, data: &[u8], size: i64) {
        if data.is_empty() {
            self.complete = true;
            return;
        }
        let end = pos + data.len() as i64;
        if end > self.seen && pos <= self.seen {
            let from = (self.seen - pos) as usize;
            self.feed(&data[from..]);
            self.seen = end;
        }
        if size >= 0 && self.seen >= size {
            self.complete = true;
        }
    }

    fn feed(&mut self, data: &[u8]) {
        for event in self.events.iter_mut() {
            event.handle_data(data);
        }
        if self.lines.iter().any(|l| !l.is_ready_with_stream()) {
            self.split_lines(data);
        }
        self.collect_markup(data);
    }

    fn split_lines(&mut self, data: &[u8]) {
        for part in data.split_inclusive(|&b| b == b'\n') {
            let (body, ended) = match part.strip_suffix(b"\n") {
                Some(body) => (body, true),
                None => (part, false),
            };
            let room = MAX_LINE.saturating_sub(self.line.len());
            self.line.extend_from_slice(&body[..body.len().min(room)]);
            if ended {
                self.emit_line();
            }
        }
    }

    fn emit_line(&mut self) {
        let line = self.line.strip_suffix(b"\r").unwrap_or(&self.line);
        let text = String::from_utf8_lossy(line);
        for analyzer in self.lines.iter_mut() {
            analyzer.handle_line(&text);
        }
        self.line.clear();
    }

    fn collect_markup(&mut self, data: &[u8]) {
        match self.markup {
            Markup::Undecided => {
                self.markup_data.extend_from_slice(data);
                let first = skip_bom_and_space(&self.markup_data).first().copied();
                match first {
                    None => {}
                    Some(b'<') => self.markup = Markup::Collecting,
                    Some(_) => {
                        self.markup = Markup::Off;
                        self.markup_data = Vec::new();
                    }
                }
            }
            Markup::Collecting => self.markup_data.extend_from_slice(data),
            Markup::Full | Markup::Off => return,
        }
        if self.markup_data.len() >= self.markup_limit && self.markup == Markup::Collecting {
            self.markup_data.truncate(self.markup_limit);
            self.markup = Markup::Full;
        }
    }

    fn is_ready(&self) -> bool {
        self.complete
            || (self.events.iter().all(|e| e.is_ready_with_stream())
                && self.lines.iter().all(|l| l.is_ready_with_stream())
                && matches!(self.markup, Markup::Full | Markup::Off))
    }

    fn finish(&mut self, result: &mut AnalysisResult<'_>) {
        if !self.line.is_empty() {
            self.emit_line();
        }
        if matches!(self.markup, Markup::Collecting | Markup::Full) {
            replay_markup(&self.markup_data, &mut self.sax);
        }
        let complete = self.complete;
        for event in self.events.iter_mut() {
            event.end_analysis(result, complete);
        }
        for line in self.lines.iter_mut() {
            line.end_analysis(result, complete);
        }
        for sax in self.sax.iter_mut() {
            sax.end_analysis(result, complete);
        }
        self.markup_data = Vec::new();
        self.markup = Markup::Off;
    }
}

/// Through-analyzer feeding the event, line and SAX analyzers of one depth.
pub struct EventThroughAnalyzer {
    dispatch: Arc<Mutex<EventDispatch>>,
}

impl EventThroughAnalyzer {
    pub fn new(
        events: Vec<Box<dyn EventAnalyzer>>,
        lines: Vec<Box<dyn LineAnalyzer>>,
        sax: Vec<Box<dyn SaxAnalyzer>>,
        markup_limit: usize,
    ) -> Self {
        Self {
            dispatch: Arc::new(Mutex::new(EventDispatch {
                events,
                lines,
                sax,
                markup_limit,
                seen: 0,
                complete: false,
                line: Vec::new(),
                markup: Markup::Off,
                markup_data: Vec::new(),
            })),
        }
    }
}

impl ThroughAnalyzer for EventThroughAnalyzer {
    fn connect_input_stream<'s>(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's> {
        self.dispatch.lock().start(result, input.position());
        Box::new(DataEventStream {
            inner: input,
            dispatch: Arc::clone(&self.dispatch),
        })
    }

    fn is_ready_with_stream(&self) -> bool {
        self.dispatch.lock().is_ready()
    }

    fn release(&mut self, result: &mut AnalysisResult<'_>) {
        self.dispatch.lock().finish(result);
    }
}

/// Passes every read on to the dispatcher.
struct DataEventStream<'s> {
    inner: Box<dyn Stream<u8> + 's>,
    dispatch: Arc<Mutex<EventDispatch>>,
}

impl Stream<u8> for DataEventStream<'_> {
    fn read(&mut self, min: usize, max: usize) -> Result<&[u8], StreamError> {
        let pos = self.inner.position();
        let size = self.inner.size();
        let data = self.inner.read(min, max)?;
        self.dispatch.lock().observe(pos, data, size);
        Ok(data)
    }

    fn reset(&mut self, pos: i64) -> i64 {
        self.inner.reset(pos)
    }

    fn mark(&mut self, limit: usize) -> bool {
        self.inner.mark(limit)
    }

    fn position(&self) -> i64 {
        self.inner.position()
    }

    fn size(&self) -> i64 {
        self.inner.size()
    }

    fn status(&self) -> StreamStatus {
        self.inner.status()
    }

    fn error(&self) -> Option<&StreamError> {
        self.inner.error()
    }
}

fn lower_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase()
}

fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    let mut attrs = e.html_attributes();
    attrs.with_checks(false);
    attrs
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).to_ascii_lowercase();
            let value = match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            };
            (key, value)
        })
        .collect()
}

/// Parse collected markup leniently and report it to the SAX analyzers.
/// Parsing stops at the first error.
fn replay_markup(data: &[u8], sax: &mut [Box<dyn SaxAnalyzer>]) {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let (name, attrs) = (lower_name(&e), attributes(&e));
                for s in sax.iter_mut() {
                    s.start_element(&name, &attrs);
                }
            }
            Ok(Event::Empty(e)) => {
                let (name, attrs) = (lower_name(&e), attributes(&e));
                for s in sax.iter_mut() {
                    s.start_element(&name, &attrs);
                    s.end_element(&name);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                for s in sax.iter_mut() {
                    s.end_element(&name);
                }
            }
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                for s in sax.iter_mut() {
                    s.characters(&text);
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                for s in sax.iter_mut() {
                    s.characters(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, position = reader.buffer_position(), "Markup parse stopped");
                break;
            }
        }
    }
}
