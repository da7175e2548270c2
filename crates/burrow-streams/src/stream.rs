//! The pull-stream contract shared by every source, decoder and wrapper.

use crate::StreamError;

/// Largest chunk requested per `read` while skipping.
pub const SKIP_CHUNK: usize = 64 * 1024;

/// Status of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// More data may be available
    Ok,
    /// All data has been read
    Eof,
    /// The stream failed; see [`Stream::error`]
    Error,
}

/// A pull-based stream of elements (`u8` for bytes, `char` for text).
///
/// `read` hands out a borrowed window of the stream's internal buffer. The
/// window is valid until the next call on the stream. Previously read data
/// can be revisited with `reset` as long as it is still retained by the
/// buffer; callers must compare the returned position with the one they
/// asked for.
pub trait Stream<T> {
    /// Read at least `min` (at least one) and at most `max` elements.
    ///
    /// `max == 0` means no upper bound. Fewer than `min` elements are returned
    /// only when the stream ends. An empty slice means end of stream.
    fn read(&mut self, min: usize, max: usize) -> Result<&[T], StreamError>;

    /// Move back (or forward, within buffered data) to `pos`.
    ///
    /// Returns the position after the call, which equals `pos` on success
    /// and the unchanged current position when `pos` is out of reach.
    fn reset(&mut self, pos: i64) -> i64;

    /// Keep the next `limit` elements, counted from the current position,
    /// reachable by `reset`.
    ///
    /// Returns false when the stream cannot give that guarantee.
    fn mark(&mut self, limit: usize) -> bool {
        let _ = limit;
        false
    }

    /// Current position in elements from the start of the stream.
    fn position(&self) -> i64;

    /// Total size in elements, or -1 while unknown.
    fn size(&self) -> i64;

    /// Current status.
    fn status(&self) -> StreamStatus;

    /// The error that put the stream into [`StreamStatus::Error`].
    fn error(&self) -> Option<&StreamError>;

    /// Skip `n` elements by reading and discarding them in bounded chunks.
    ///
    /// Returns how many elements were skipped, which is less than `n` only
    /// when the stream ended.
    fn skip(&mut self, n: i64) -> Result<i64, StreamError> {
        let mut skipped = 0i64;
        while skipped < n {
            let step = usize::try_from(n - skipped)
                .unwrap_or(SKIP_CHUNK)
                .min(SKIP_CHUNK);
            let got = self.read(1, step)?.len();
            if got == 0 {
                break;
            }
            skipped += got as i64;
        }
        Ok(skipped)
    }
}

impl<T, S: Stream<T> + ?Sized> Stream<T> for &mut S {
    fn read(&mut self, min: usize, max: usize) -> Result<&[T], StreamError> {
        (**self).read(min, max)
    }

    fn reset(&mut self, pos: i64) -> i64 {
        (**self).reset(pos)
    }

    fn mark(&mut self, limit: usize) -> bool {
        (**self).mark(limit)
    }

    fn position(&self) -> i64 {
        (**self).position()
    }

    fn size(&self) -> i64 {
        (**self).size()
    }

    fn status(&self) -> StreamStatus {
        (**self).status()
    }

    fn error(&self) -> Option<&StreamError> {
        (**self).error()
    }

    fn skip(&mut self, n: i64) -> Result<i64, StreamError> {
        (**self).skip(n)
    }
}

impl<T, S: Stream<T> + ?Sized> Stream<T> for Box<S> {
    fn read(&mut self, min: usize, max: usize) -> Result<&[T], StreamError> {
        (**self).read(min, max)
    }

    fn reset(&mut self, pos: i64) -> i64 {
        (**self).reset(pos)
    }

    fn mark(&mut self, limit: usize) -> bool {
        (**self).mark(limit)
    }

    fn position(&self) -> i64 {
        (**self).position()
    }

    fn size(&self) -> i64 {
        (**self).size()
    }

    fn status(&self) -> StreamStatus {
        (**self).status()
    }

    fn error(&self) -> Option<&StreamError> {
        (**self).error()
    }

    fn skip(&mut self, n: i64) -> Result<i64, StreamError> {
        (**self).skip(n)
    }
}

/// Read exactly `n` elements into an owned vector.
///
/// Returns fewer elements only when the stream ends first.
pub fn read_exact<T: Copy>(
    stream: &mut (impl Stream<T> + ?Sized),
    n: usize,
) -> Result<Vec<T>, StreamError> {
    Ok(stream.read(n, n)?.to_vec())
}
