//! gzip decoding stream.
//!
//! The member header is parsed here so the stored file name is available to
//! analyzers; the deflate body goes through `flate2`.

use flate2::{Crc, Decompress, FlushDecompress, Status};
use tracing::debug;

use crate::{BufferedStream, Fill, Filled, Stream, StreamError};

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// Look-back kept by the decoded stream.
const GZIP_BUFFER_SIZE: usize = 128 * 1024;

/// Whether `header` starts with the gzip signature and deflate method.
pub fn is_gzip(header: &[u8]) -> bool {
    header.len() >= 3 && header[0] == 0x1f && header[1] == 0x8b && header[2] == 0x08
}

/// Inflates a gzip member pulled from an upstream stream.
pub struct GzipSource<'p> {
    upstream: &'p mut dyn Stream<u8>,
    decoder: Option<Decompress>,
    crc: Crc,
    file_name: Option<String>,
}

impl<'p> GzipSource<'p> {
    /// Check the upstream for the gzip signature without consuming it.
    pub fn probe(upstream: &mut dyn Stream<u8>) -> Result<bool, StreamError> {
        let start = upstream.position();
        let matches = is_gzip(upstream.read(3, 3)?);
        if upstream.reset(start) != start {
            return Err(StreamError::Rewind(start));
        }
        Ok(matches)
    }

    /// Parse the member header and decode the body that follows.
    pub fn open(upstream: &'p mut dyn Stream<u8>) -> Result<GzipStream<'p>, StreamError> {
        if !Self::probe(upstream)? {
            return Err(StreamError::Format("not a gzip stream".to_string()));
        }

        let header = read_bytes(upstream, 10, "gzip header")?;
        let flags = header[3];

        if flags & FEXTRA != 0 {
            let len = read_bytes(upstream, 2, "gzip extra length")?;
            let len = u16::from_le_bytes([len[0], len[1]]) as i64;
            if upstream.skip(len)? != len {
                return Err(StreamError::UnexpectedEof("gzip extra field".to_string()));
            }
        }
        let file_name = if flags & FNAME != 0 {
            Some(read_zero_terminated(upstream)?)
        } else {
            None
        };
        if flags & FCOMMENT != 0 {
            read_zero_terminated(upstream)?;
        }
        if flags & FHCRC != 0 {
            read_bytes(upstream, 2, "gzip header checksum")?;
        }

        Ok(BufferedStream::with_buffer_size(
            Self {
                upstream,
                decoder: Some(Decompress::new(false)),
                crc: Crc::new(),
                file_name,
            },
            GZIP_BUFFER_SIZE,
        ))
    }

    /// Original file name stored in the header, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    fn check_trailer(&mut self, decoded: u64) -> Result<(), StreamError> {
        let trailer = read_bytes(&mut *self.upstream, 8, "gzip trailer")?;
        let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        if crc != self.crc.sum() {
            return Err(StreamError::Decode("gzip checksum mismatch".to_string()));
        }
        if isize != decoded as u32 {
            return Err(StreamError::Decode("gzip length mismatch".to_string()));
        }
        Ok(())
    }
}

impl Fill<u8> for GzipSource<'_> {
    fn fill(&mut self, out: &mut [u8]) -> Result<Filled, StreamError> {
        loop {
            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(Filled::End);
            };

            let start = self.upstream.position();
            let input = self.upstream.read(1, 0)?;
            let input_len = input.len();

            let in_before = decoder.total_in();
            let out_before = decoder.total_out();
            let status = decoder
                .decompress(input, out, FlushDecompress::None)
                .map_err(|e| StreamError::Decode(format!("deflate: {}", e)))?;
            let consumed = (decoder.total_in() - in_before) as usize;
            let produced = (decoder.total_out() - out_before) as usize;
            let decoded = decoder.total_out();

            if consumed < input_len {
                let target = start + consumed as i64;
                if self.upstream.reset(target) != target {
                    return Err(StreamError::Rewind(target));
                }
            }
            self.crc.update(&out[..produced]);

            if let Status::StreamEnd = status {
                self.decoder = None;
                self.check_trailer(decoded)?;
                debug!(decoded, "gzip member finished");
                return Ok(if produced > 0 {
                    Filled::Data(produced)
                } else {
                    Filled::End
                });
            }
            if produced > 0 {
                return Ok(Filled::Data(produced));
            }
            if input_len == 0 {
                return Err(StreamError::UnexpectedEof(
                    "gzip data ended before the end of the deflate stream".to_string(),
                ));
            }
        }
    }
}

/// Stream of decompressed gzip data.
pub type GzipStream<'p> = BufferedStream<u8, GzipSource<'p>>;

fn read_bytes(
    upstream: &mut dyn Stream<u8>,
    n: usize,
    what: &str,
) -> Result<Vec<u8>, StreamError> {
    let data = upstream.read(n, n)?;
    if data.len() < n {
        return Err(StreamError::UnexpectedEof(what.to_string()));
    }
    Ok(data.to_vec())
}

fn read_zero_terminated(upstream: &mut dyn Stream<u8>) -> Result<String, StreamError> {
    let mut bytes = Vec::new();
    loop {
        match upstream.read(1, 1)?.first() {
            Some(0) => break,
            Some(&b) => bytes.push(b),
            None => {
                return Err(StreamError::UnexpectedEof(
                    "unterminated gzip header string".to_string(),
                ))
            }
        }
    }
    // Header strings are ISO-8859-1.
    Ok(bytes.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStream, StreamStatus};
    use flate2::write::GzEncoder;
    use flate2::{Compression, GzBuilder};
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn read_all(stream: &mut dyn Stream<u8>) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::new();
        loop {
            let chunk = stream.read(1, 0)?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(chunk);
        }
    }

    #[test]
    fn test_decodes_member() {
        let text = b"the quick brown fox ".repeat(4000);
        let mut upstream = MemoryStream::from_bytes(gzip(&text));

        let mut decoded = GzipSource::open(&mut upstream).unwrap();
        assert_eq!(decoded.source().file_name(), None);
        assert_eq!(read_all(&mut decoded).unwrap(), text);
        assert_eq!(decoded.status(), StreamStatus::Eof);
    }

    #[test]
    fn test_file_name_from_header() {
        let mut encoder = GzBuilder::new()
            .filename("notes.txt")
            .comment("a comment")
            .write(Vec::new(), Compression::default());
        encoder.write_all(b"hello").unwrap();
        let data = encoder.finish().unwrap();

        let mut upstream = MemoryStream::from_bytes(data);
        let mut decoded = GzipSource::open(&mut upstream).unwrap();
        assert_eq!(decoded.source().file_name(), Some("notes.txt"));
        assert_eq!(read_all(&mut decoded).unwrap(), b"hello");
    }

    #[test]
    fn test_corrupt_checksum() {
        let mut data = gzip(b"checksummed payload");
        let len = data.len();
        data[len - 8] ^= 0xff;
        let mut upstream = MemoryStream::from_bytes(data);

        let mut decoded = GzipSource::open(&mut upstream).unwrap();
        let err = read_all(&mut decoded).unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)));
    }

    #[test]
    fn test_probe_rewinds() {
        let mut upstream = MemoryStream::from_bytes(b"plain text".to_vec());

        assert!(!GzipSource::probe(&mut upstream).unwrap());
        assert_eq!(upstream.position(), 0);
    }
}
