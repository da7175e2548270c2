//! Buffered stream over a fill primitive.
//!
//! Concrete sources and decoders only implement [`Fill`]; buffering,
//! look-back, skipping and size enforcement live here.

use crate::buffer::StreamBuffer;
use crate::{Stream, StreamError, StreamStatus};

/// Default number of slots allocated for a new stream.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Outcome of one [`Fill::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filled {
    /// `n` elements were written to the front of the output slice
    Data(usize),
    /// The source has no more data
    End,
}

/// A source of elements for a [`BufferedStream`].
pub trait Fill<T> {
    /// Write up to `out.len()` elements into `out`.
    fn fill(&mut self, out: &mut [T]) -> Result<Filled, StreamError>;

    /// Size of the data this source will produce, or -1 if unknown.
    fn declared_size(&self) -> i64 {
        -1
    }
}

/// A [`Stream`] that buffers the output of a [`Fill`] source.
pub struct BufferedStream<T, F> {
    source: F,
    buffer: StreamBuffer<T>,
    position: i64,
    size: i64,
    status: StreamStatus,
    error: Option<StreamError>,
    finished: bool,
}

impl<T: Copy + Default, F: Fill<T>> BufferedStream<T, F> {
    /// Wrap `source` with the default buffer size.
    pub fn new(source: F) -> Self {
        Self::with_buffer_size(source, DEFAULT_BUFFER_SIZE)
    }

    /// Wrap `source`, allocating `capacity` slots up front.
    ///
    /// A larger buffer keeps a longer look-back window.
    pub fn with_buffer_size(source: F, capacity: usize) -> Self {
        let size = source.declared_size();
        Self {
            source,
            buffer: StreamBuffer::with_capacity(capacity),
            position: 0,
            size,
            status: StreamStatus::Ok,
            error: None,
            finished: false,
        }
    }

    /// The wrapped source.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Consume the stream, returning the wrapped source.
    pub fn into_source(self) -> F {
        self.source
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        self.status = StreamStatus::Error;
        self.error = Some(error.clone());
        error
    }

    /// Pull from the source until `min` elements are buffered or it ends.
    fn write_to_buffer(&mut self, min: usize) -> Result<(), StreamError> {
        while self.buffer.avail() < min {
            let missing = min - self.buffer.avail();
            let space = self.buffer.make_space(missing);
            let spare = self.buffer.spare_mut(space);
            match self.source.fill(spare) {
                Ok(Filled::Data(n)) => self.buffer.commit(n),
                Ok(Filled::End) => {
                    self.finished = true;
                    break;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }
}

impl<T: Copy + Default, F: Fill<T>> Stream<T> for BufferedStream<T, F> {
    fn read(&mut self, min: usize, max: usize) -> Result<&[T], StreamError> {
        match self.status {
            StreamStatus::Error => {
                return Err(self
                    .error
                    .clone()
                    .unwrap_or_else(|| StreamError::Io("stream failed".to_string())))
            }
            StreamStatus::Eof => return Ok(&[]),
            StreamStatus::Ok => {}
        }

        let min = min.max(1);
        let max = if max == 0 { 0 } else { max.max(min) };
        if !self.finished && self.buffer.avail() < min {
            self.write_to_buffer(min)?;
        }

        let range = self.buffer.take(max);
        let n = range.len() as i64;
        self.position += n;
        if self.size >= 0 && self.position > self.size {
            let size = self.size;
            return Err(self.fail(StreamError::TooLong { size }));
        }
        if self.buffer.avail() == 0 && self.finished {
            self.status = StreamStatus::Eof;
            if self.size == -1 {
                self.size = self.position;
            }
        }
        Ok(self.buffer.slice(range))
    }

    fn reset(&mut self, pos: i64) -> i64 {
        if self.status == StreamStatus::Error {
            return self.position;
        }
        let d = self.position - pos;
        if self.buffer.rewind(d) {
            self.position = pos;
            self.status = StreamStatus::Ok;
        }
        self.position
    }

    fn mark(&mut self, limit: usize) -> bool {
        if self.status == StreamStatus::Error {
            return false;
        }
        self.buffer.reserve_ahead(limit);
        true
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn status(&self) -> StreamStatus {
        self.status
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }
}
