//! SHA-256 digest of each unit's bytes.
//!
//! The digest is only written when every byte passed through the wrapper in
//! order. Data revisited after a reset is hashed once.

use std::sync::Arc;

use burrow_streams::{Stream, StreamError, StreamStatus};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::analyzer::{AnalyzerFactory, ThroughAnalyzer, ThroughAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

pub const SHA256_FIELD: &str = "content.sha256";

pub struct DigestThroughFactory;

impl AnalyzerFactory for DigestThroughFactory {
    fn name(&self) -> &'static str {
        "digest"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(SHA256_FIELD, FieldType::Text, 1);
    }

    fn wants(&self, config: &AnalyzerConfig) -> bool {
        config.enable_digest && !config.is_disabled(self.name())
    }
}

impl ThroughAnalyzerFactory for DigestThroughFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn ThroughAnalyzer> {
        Box::new(DigestThroughAnalyzer::default())
    }
}

#[derive(Default)]
struct DigestState {
    hasher: Sha256,
    seen: i64,
    done: bool,
    gap: bool,
}

#[derive(Default)]
pub struct DigestThroughAnalyzer {
    state: Option<Arc<Mutex<DigestState>>>,
}

impl ThroughAnalyzer for DigestThroughAnalyzer {
    fn connect_input_stream<'s>(
        &mut self,
        _result: &mut AnalysisResult<'_>,
        input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's> {
        let state = Arc::new(Mutex::new(DigestState {
            seen: input.position(),
            ..Default::default()
        }));
        self.state = Some(Arc::clone(&state));
        Box::new(DigestStream { inner: input, state })
    }

    fn is_ready_with_stream(&self) -> bool {
        self.state.as_ref().map_or(true, |s| s.lock().done)
    }

    fn release(&mut self, result: &mut AnalysisResult<'_>) {
        let Some(state) = self.state.take() else {
            return;
        };
        let mut state = state.lock();
        if state.done && !state.gap {
            let digest = std::mem::take(&mut state.hasher).finalize();
            result.add_field(SHA256_FIELD, format!("{:x}", digest));
        }
    }
}

/// Hashes bytes as they are read through it.
struct DigestStream<'s> {
    inner: Box<dyn Stream<u8> + 's>,
    state: Arc<Mutex<DigestState>>,
}

impl Stream<u8> for DigestStream<'_> {
    fn read(&mut self, min: usize, max: usize) -> Result<&[u8], StreamError> {
        let pos = self.inner.position();
        let size = self.inner.size();
        let data = self.inner.read(min, max)?;

        let mut state = self.state.lock();
        if state.done {
            return Ok(data);
        }
        if data.is_empty() {
            state.done = true;
            return Ok(data);
        }
        if pos > state.seen {
            state.gap = true;
        }
        let end = pos + data.len() as i64;
        if end > state.seen {
            let from = (state.seen - pos).max(0) as usize;
            state.hasher.update(&data[from..]);
            state.seen = end;
        }
        if size >= 0 && state.seen >= size {
            state.done = true;
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_streams::MemoryStream;

    fn hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn wrap<'s>(input: Box<dyn Stream<u8> + 's>) -> (DigestStream<'s>, Arc<Mutex<DigestState>>) {
        let state = Arc::new(Mutex::new(DigestState::default()));
        let stream = DigestStream {
            inner: input,
            state: Arc::clone(&state),
        };
        (stream, state)
    }

    #[test]
    fn test_reset_does_not_hash_twice() {
        let data = b"the quick brown fox".to_vec();
        let (mut stream, state) = wrap(Box::new(MemoryStream::from_bytes(data.clone())));

        stream.read(4, 4).unwrap();
        assert_eq!(stream.reset(0), 0);
        stream.read(10, 10).unwrap();
        stream.skip(100).unwrap();

        let mut state = state.lock();
        assert!(state.done);
        assert!(!state.gap);
        let digest = std::mem::take(&mut state.hasher).finalize();
        assert_eq!(format!("{:x}", digest), hex(&data));
    }

    #[test]
    fn test_not_done_until_end() {
        let (mut stream, state) = wrap(Box::new(MemoryStream::from_bytes(vec![7u8; 100])));
        stream.read(10, 10).unwrap();
        assert!(!state.lock().done);
    }
}
