//! UTF-8 decoding into a `char` stream.

use crate::{BufferedStream, Fill, Filled, Stream, StreamError};

/// Decodes UTF-8 bytes from an upstream stream into characters.
pub struct Utf8Source<'p> {
    upstream: &'p mut dyn Stream<u8>,
    pending: Vec<u8>,
    decoded_bytes: u64,
}

impl<'p> Utf8Source<'p> {
    /// Character stream over `upstream`.
    pub fn open(upstream: &'p mut dyn Stream<u8>) -> Utf8Stream<'p> {
        BufferedStream::new(Self {
            upstream,
            pending: Vec::with_capacity(4),
            decoded_bytes: 0,
        })
    }
}

impl Fill<char> for Utf8Source<'_> {
    fn fill(&mut self, out: &mut [char]) -> Result<Filled, StreamError> {
        // Every character completed here needs at least one new byte, so
        // reading `out.len()` bytes can never overflow `out`.
        let data = self.upstream.read(1, out.len())?;
        if data.is_empty() {
            if self.pending.is_empty() {
                return Ok(Filled::End);
            }
            return Err(StreamError::Decode(format!(
                "truncated UTF-8 sequence at byte {}",
                self.decoded_bytes
            )));
        }
        self.pending.extend_from_slice(data);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(StreamError::Decode(format!(
                    "invalid UTF-8 sequence at byte {}",
                    self.decoded_bytes + e.valid_up_to() as u64
                )))
            }
        };
        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| StreamError::Decode(e.to_string()))?;

        let mut n = 0;
        for (slot, c) in out.iter_mut().zip(text.chars()) {
            *slot = c;
            n += 1;
        }
        self.pending.drain(..valid);
        self.decoded_bytes += valid as u64;
        Ok(Filled::Data(n))
    }
}

/// Stream of characters decoded from UTF-8.
pub type Utf8Stream<'p> = BufferedStream<char, Utf8Source<'p>>;
