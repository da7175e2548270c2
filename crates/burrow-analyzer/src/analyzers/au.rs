//! Sun/NeXT `.au` audio headers.

use burrow_streams::{read_exact, Stream};
use tracing::warn;

use crate::analyzer::{AnalyzerFactory, ThroughAnalyzer, ThroughAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

/// Playing time in whole seconds.
pub const LENGTH_FIELD: &str = "audio.length";
pub const SAMPLE_RATE_FIELD: &str = "audio.sample_rate";
pub const CHANNELS_FIELD: &str = "audio.channels";
pub const ENCODING_FIELD: &str = "audio.encoding";

const MAGIC: &[u8; 4] = b".snd";
const HEADER_LEN: usize = 24;
const UNKNOWN_SIZE: u32 = 0xffff_ffff;

pub struct AuThroughFactory;

impl AnalyzerFactory for AuThroughFactory {
    fn name(&self) -> &'static str {
        "au"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(LENGTH_FIELD, FieldType::Integer, 1);
        fields.register(SAMPLE_RATE_FIELD, FieldType::Integer, 1);
        fields.register(CHANNELS_FIELD, FieldType::Integer, 1);
        fields.register(ENCODING_FIELD, FieldType::Text, 1);
    }
}

impl ThroughAnalyzerFactory for AuThroughFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn ThroughAnalyzer> {
        Box::new(AuThroughAnalyzer)
    }
}

pub struct AuThroughAnalyzer;

impl ThroughAnalyzer for AuThroughAnalyzer {
    fn connect_input_stream<'s>(
        &mut self,
        result: &mut AnalysisResult<'_>,
        mut input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's> {
        let start = input.position();
        let header = if input.mark(HEADER_LEN) {
            read_exact(&mut *input, HEADER_LEN).ok()
        } else {
            None
        };
        if input.reset(start) != start {
            warn!(path = result.path(), "Stream cannot rewind after AU header");
        }

        if let Some(info) = header.as_deref().and_then(parse_header) {
            let stream_size = input.size();
            result.add_field(SAMPLE_RATE_FIELD, info.sample_rate as i64);
            result.add_field(CHANNELS_FIELD, info.channels as i64);
            if let Some(name) = encoding_name(info.encoding) {
                result.add_field(ENCODING_FIELD, name);
            }
            if let Some(seconds) = info.length(stream_size) {
                result.add_field(LENGTH_FIELD, seconds);
            }
        }
        input
    }

    fn is_ready_with_stream(&self) -> bool {
        true
    }

    fn release(&mut self, _result: &mut AnalysisResult<'_>) {}
}

#[derive(Debug, PartialEq, Eq)]
struct AuHeader {
    data_offset: u32,
    data_size: u32,
    encoding: u32,
    sample_rate: u32,
    channels: u32,
}

impl AuHeader {
    /// Whole seconds of audio. The data size falls back to what follows the
    /// header when the file does not state it.
    fn length(&self, stream_size: i64) -> Option<i64> {
        let data_size = if self.data_size == UNKNOWN_SIZE {
            if stream_size < 0 {
                return None;
            }
            (stream_size - self.data_offset as i64).max(0)
        } else {
            self.data_size as i64
        };
        let frame = bytes_per_sample(self.encoding)? as i64 * self.channels as i64;
        let per_second = frame * self.sample_rate as i64;
        if per_second == 0 {
            return None;
        }
        Some(data_size / per_second)
    }
}

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn parse_header(header: &[u8]) -> Option<AuHeader> {
    if header.len() < HEADER_LEN || &header[..4] != MAGIC {
        return None;
    }
    let info = AuHeader {
        data_offset: be32(&header[4..8]),
        data_size: be32(&header[8..12]),
        encoding: be32(&header[12..16]),
        sample_rate: be32(&header[16..20]),
        channels: be32(&header[20..24]),
    };
    if (info.data_offset as usize) < HEADER_LEN || info.channels == 0 {
        return None;
    }
    Some(info)
}

fn bytes_per_sample(encoding: u32) -> Option<u32> {
    match encoding {
        1 | 2 | 27 => Some(1),
        3 => Some(2),
        4 => Some(3),
        5 | 6 => Some(4),
        7 => Some(8),
        _ => None,
    }
}

fn encoding_name(encoding: u32) -> Option<&'static str> {
    Some(match encoding {
        1 => "8-bit G.711 mu-law",
        2 => "8-bit linear PCM",
        3 => "16-bit linear PCM",
        4 => "24-bit linear PCM",
        5 => "32-bit linear PCM",
        6 => "32-bit IEEE floating point",
        7 => "64-bit IEEE floating point",
        23 => "4-bit ADPCM G.721",
        25 => "3-bit ADPCM G.723",
        26 => "5-bit ADPCM G.723",
        27 => "8-bit G.711 A-law",
        _ => return None,
    })
}

/// Header of an `.au` file with the given parameters.
#[cfg(test)]
fn build_header(data_size: u32, encoding: u32, sample_rate: u32, channels: u32) -> Vec<u8> {
    let mut header = MAGIC.to_vec();
    for value in [HEADER_LEN as u32, data_size, encoding, sample_rate, channels] {
        header.extend_from_slice(&value.to_be_bytes());
    }
    header
}
