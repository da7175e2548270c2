//! ID3v2 tags at the start of audio files.
//!
//! The tag is read when the stream is connected. The stream is marked for
//! the header and then for the tag body before each read, and rewound
//! before it is handed on, so the analyzers downstream start at the same
//! position.

use burrow_streams::{read_exact, Stream};
use tracing::warn;

use crate::analyzer::{AnalyzerFactory, ThroughAnalyzer, ThroughAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

pub const TITLE_FIELD: &str = "content.title";
pub const ARTIST_FIELD: &str = "media.artist";
pub const ALBUM_FIELD: &str = "media.album";
pub const GENRE_FIELD: &str = "media.genre";
pub const YEAR_FIELD: &str = "media.year";

const HEADER_LEN: usize = 10;
const MAX_TAG: usize = 256 * 1024;

pub struct Id3v2ThroughFactory;

impl AnalyzerFactory for Id3v2ThroughFactory {
    fn name(&self) -> &'static str {
        "id3v2"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(TITLE_FIELD, FieldType::Text, 1);
        fields.register(ARTIST_FIELD, FieldType::Text, 1);
        fields.register(ALBUM_FIELD, FieldType::Text, 1);
        fields.register(GENRE_FIELD, FieldType::Text, 1);
        fields.register(YEAR_FIELD, FieldType::Integer, 1);
    }
}

impl ThroughAnalyzerFactory for Id3v2ThroughFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn ThroughAnalyzer> {
        Box::new(Id3v2ThroughAnalyzer)
    }
}

pub struct Id3v2ThroughAnalyzer;

impl ThroughAnalyzer for Id3v2ThroughAnalyzer {
    fn connect_input_stream<'s>(
        &mut self,
        result: &mut AnalysisResult<'_>,
        mut input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's> {
        let start = input.position();
        let tag = read_tag(&mut *input);
        if input.reset(start) != start {
            warn!(path = result.path(), "Stream cannot rewind after ID3v2 tag");
        }

        if let Some((version, body)) = tag {
            for (field, value) in parse_frames(version, &body) {
                match field {
                    YEAR_FIELD => {
                        if let Some(year) = parse_year(&value) {
                            result.add_field(field, year);
                        }
                    }
                    _ => result.add_field(field, value),
                }
            }
        }
        input
    }

    fn is_ready_with_stream(&self) -> bool {
        true
    }

    fn release(&mut self, _result: &mut AnalysisResult<'_>) {}
}

/// Format version and body of the tag at the current position.
///
/// Nothing is read from a stream that cannot keep the bytes for a rewind.
fn read_tag(input: &mut dyn Stream<u8>) -> Option<(u8, Vec<u8>)> {
    if !input.mark(HEADER_LEN) {
        return None;
    }
    let header = read_exact(input, HEADER_LEN).ok()?;
    let size = tag_size(&header).filter(|&size| size > 0)?.min(MAX_TAG);
    if !input.mark(size) {
        return None;
    }
    let body = read_exact(input, size).ok()?;
    Some((header[3], body))
}

/// Size of the tag body when `header` starts a supported tag.
fn tag_size(header: &[u8]) -> Option<usize> {
    if header.len() < HEADER_LEN || &header[..3] != b"ID3" || !(3..=4).contains(&header[3]) {
        return None;
    }
    syncsafe(&header[6..10])
}

fn syncsafe(bytes: &[u8]) -> Option<usize> {
    if bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    Some(bytes.iter().fold(0usize, |acc, &b| (acc << 7) | b as usize))
}

fn parse_frames(version: u8, body: &[u8]) -> Vec<(&'static str, String)> {
    let mut values = Vec::new();
    let mut pos = 0;
    while pos + 10 <= body.len() {
        let id = &body[pos..pos + 4];
        if id[0] == 0 {
            break;
        }
        let size_bytes = &body[pos + 4..pos + 8];
        let size = if version == 4 {
            match syncsafe(size_bytes) {
                Some(size) => size,
                None => break,
            }
        } else {
            u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]) as usize
        };
        let flags = body[pos + 9];
        let data_start = pos + 10;
        let Some(data) = body.get(data_start..data_start + size) else {
            break;
        };
        pos = data_start + size;

        // Compressed or encrypted frames are skipped.
        if flags & 0xcc != 0 {
            continue;
        }
        let field = match id {
            b"TIT2" => TITLE_FIELD,
            b"TPE1" => ARTIST_FIELD,
            b"TALB" => ALBUM_FIELD,
            b"TCON" => GENRE_FIELD,
            b"TYER" | b"TDRC" => YEAR_FIELD,
            _ => continue,
        };
        if let Some(text) = decode_text(data).filter(|t| !t.is_empty()) {
            values.push((field, text));
        }
    }
    values
}

/// Text frame payload: an encoding byte followed by the text. Only the first
/// of several NUL separated values is kept.
fn decode_text(data: &[u8]) -> Option<String> {
    let (&encoding, text) = data.split_first()?;
    let decoded: String = match encoding {
        0 => text.iter().map(|&b| b as char).collect(),
        1 => match text {
            [0xff, 0xfe, rest @ ..] => utf16(rest, u16::from_le_bytes),
            [0xfe, 0xff, rest @ ..] => utf16(rest, u16::from_be_bytes),
            _ => return None,
        },
        2 => utf16(text, u16::from_be_bytes),
        3 => String::from_utf8_lossy(text).into_owned(),
        _ => return None,
    };
    let first = decoded.split('\0').next().unwrap_or_default();
    Some(first.trim().to_string())
}

fn utf16(data: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = data.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    String::from_utf16_lossy(&units)
}

fn parse_year(value: &str) -> Option<i64> {
    value.get(..4)?.parse().ok()
}

#[cfg(test)]
pub(crate) fn build_tag(frames: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, payload) in frames {
        body.extend_from_slice(*id);
        body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(payload);
    }
    let size = body.len();
    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend_from_slice(&[
        ((size >> 21) & 0x7f) as u8,
        ((size >> 14) & 0x7f) as u8,
        ((size >> 7) & 0x7f) as u8,
        (size & 0x7f) as u8,
    ]);
    tag.extend_from_slice(&body);
    tag
}
