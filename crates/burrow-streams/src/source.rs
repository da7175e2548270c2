//! Plain data sources: files, memory and windows over another stream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{BufferedStream, Fill, Filled, Stream, StreamError};

/// Reads a file from disk.
pub struct FileSource {
    file: File,
    size: i64,
}

impl FileSource {
    /// Open `path`, taking the declared size from its metadata.
    pub fn open(path: &Path) -> Result<FileStream, StreamError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len() as i64;
        Ok(BufferedStream::new(Self { file, size }))
    }
}

impl Fill<u8> for FileSource {
    fn fill(&mut self, out: &mut [u8]) -> Result<Filled, StreamError> {
        match self.file.read(out)? {
            0 => Ok(Filled::End),
            n => Ok(Filled::Data(n)),
        }
    }

    fn declared_size(&self) -> i64 {
        self.size
    }
}

/// Stream over a file on disk.
pub type FileStream = BufferedStream<u8, FileSource>;

/// Serves an owned vector.
pub struct MemorySource<T> {
    data: Vec<T>,
    offset: usize,
}

impl<T> MemorySource<T> {
    /// Source over `data`.
    pub fn new(data: Vec<T>) -> Self {
        Self { data, offset: 0 }
    }
}

impl<T: Copy> Fill<T> for MemorySource<T> {
    fn fill(&mut self, out: &mut [T]) -> Result<Filled, StreamError> {
        let rest = &self.data[self.offset..];
        if rest.is_empty() {
            return Ok(Filled::End);
        }
        let n = rest.len().min(out.len());
        out[..n].copy_from_slice(&rest[..n]);
        self.offset += n;
        Ok(Filled::Data(n))
    }

    fn declared_size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Stream over an in-memory byte vector.
pub type MemoryStream = BufferedStream<u8, MemorySource<u8>>;

impl MemoryStream {
    /// Stream over `data`.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        BufferedStream::new(MemorySource::new(data.into()))
    }
}

/// Hides the declared size of the wrapped source.
///
/// The size of the stream is then only discovered at end of data, the same
/// as for pipes and decoders.
pub struct UnknownSize<F>(pub F);

impl<T, F: Fill<T>> Fill<T> for UnknownSize<F> {
    fn fill(&mut self, out: &mut [T]) -> Result<Filled, StreamError> {
        self.0.fill(out)
    }
}

/// A fixed-length window over a parent stream, starting at its current
/// position. Used for entries inside archives.
///
/// Never pulls more than the window length from the parent. A parent that
/// ends early is reported as a truncated entry.
pub struct SubSource<'p> {
    parent: &'p mut dyn Stream<u8>,
    remaining: i64,
    length: i64,
}

impl<'p> SubSource<'p> {
    /// Window of `length` bytes over `parent`.
    pub fn open(parent: &'p mut dyn Stream<u8>, length: i64) -> SubStream<'p> {
        BufferedStream::new(Self {
            parent,
            remaining: length.max(0),
            length: length.max(0),
        })
    }

    /// Bytes of the window not yet pulled from the parent.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }
}

impl Fill<u8> for SubSource<'_> {
    fn fill(&mut self, out: &mut [u8]) -> Result<Filled, StreamError> {
        if self.remaining == 0 {
            return Ok(Filled::End);
        }
        let max = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(out.len());
        let data = self.parent.read(1, max)?;
        if data.is_empty() {
            return Err(StreamError::UnexpectedEof(format!(
                "entry truncated, {} of {} bytes missing",
                self.remaining, self.length
            )));
        }
        let n = data.len();
        out[..n].copy_from_slice(data);
        self.remaining -= n as i64;
        Ok(Filled::Data(n))
    }

    fn declared_size(&self) -> i64 {
        self.length
    }
}

/// Stream over a window of a parent stream.
pub type SubStream<'p> = BufferedStream<u8, SubSource<'p>>;
