//! bzip2 decoding stream.

use bzip2::{Decompress, Status};
use tracing::debug;

use crate::{BufferedStream, Fill, Filled, Stream, StreamError};

/// Bytes needed to recognize a bzip2 stream.
pub const BZ2_MAGIC_LEN: usize = 5;

/// Look-back kept by the decoded stream.
const BZ2_BUFFER_SIZE: usize = 256 * 1024;

/// Whether `header` starts like a bzip2 stream: `BZh`, a block size digit
/// and the first byte of the block magic.
pub fn is_bzip2(header: &[u8]) -> bool {
    header.len() >= BZ2_MAGIC_LEN
        && &header[..3] == b"BZh"
        && (b'1'..=b'9').contains(&header[3])
        && header[4] == 0x31
}

/// Decompresses bzip2 data pulled from an upstream stream.
pub struct Bz2Source<'p> {
    upstream: &'p mut dyn Stream<u8>,
    decoder: Option<Decompress>,
}

impl<'p> Bz2Source<'p> {
    /// Check the upstream for the bzip2 signature without consuming it.
    pub fn probe(upstream: &mut dyn Stream<u8>) -> Result<bool, StreamError> {
        let start = upstream.position();
        let matches = is_bzip2(upstream.read(BZ2_MAGIC_LEN, BZ2_MAGIC_LEN)?);
        if upstream.reset(start) != start {
            return Err(StreamError::Rewind(start));
        }
        Ok(matches)
    }

    /// Decode the bzip2 stream starting at the upstream's current position.
    pub fn open(upstream: &'p mut dyn Stream<u8>) -> Result<Bz2Stream<'p>, StreamError> {
        if !Self::probe(upstream)? {
            return Err(StreamError::Format("not a bzip2 stream".to_string()));
        }
        Ok(BufferedStream::with_buffer_size(
            Self {
                upstream,
                decoder: Some(Decompress::new(false)),
            },
            BZ2_BUFFER_SIZE,
        ))
    }
}

impl Fill<u8> for Bz2Source<'_> {
    fn fill(&mut self, out: &mut [u8]) -> Result<Filled, StreamError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(Filled::End);
        };

        loop {
            let start = self.upstream.position();
            let input = self.upstream.read(1, 0)?;
            let input_len = input.len();

            let in_before = decoder.total_in();
            let out_before = decoder.total_out();
            let status = decoder
                .decompress(input, out)
                .map_err(|e| StreamError::Decode(format!("bzip2: {}", e)))?;
            let consumed = (decoder.total_in() - in_before) as usize;
            let produced = (decoder.total_out() - out_before) as usize;

            // Hand unconsumed input back so whatever follows the compressed
            // data can still be read from the upstream.
            if consumed < input_len {
                let target = start + consumed as i64;
                if self.upstream.reset(target) != target {
                    return Err(StreamError::Rewind(target));
                }
            }

            if let Status::StreamEnd = status {
                debug!(
                    compressed = decoder.total_in(),
                    decoded = decoder.total_out(),
                    "bzip2 stream finished"
                );
                self.decoder = None;
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
                    "bzip2 data ended before the end-of-stream marker".to_string(),
                ));
            }
        }
    }
}

/// Stream of decompressed bzip2 data.
pub type Bz2Stream<'p> = BufferedStream<u8, Bz2Source<'p>>;
