//! Burrow streams - pull-based buffered streams and decoders.
//!
//! Every stream implements [`Stream`]: bounded reads out of an internal
//! buffer, resets into the retained look-back window and chunked skipping.
//! Concrete sources only implement [`Fill`] and are wrapped in a
//! [`BufferedStream`], which also enforces declared sizes.
//!
//! Decoders read from an upstream stream and never consume more of it than
//! they decode: bzip2 and gzip hand unconsumed input back with a reset.

pub mod buffer;
pub mod buffered;
pub mod bz2;
pub mod error;
pub mod gzip;
pub mod process;
pub mod source;
pub mod stream;
pub mod utf8;

pub use buffered::{BufferedStream, Fill, Filled, DEFAULT_BUFFER_SIZE};
pub use bz2::{is_bzip2, Bz2Source, Bz2Stream};
pub use error::StreamError;
pub use gzip::{is_gzip, GzipSource, GzipStream};
pub use process::{ProcessSource, ProcessStream};
pub use source::{
    FileSource, FileStream, MemorySource, MemoryStream, SubSource, SubStream, UnknownSize,
};
pub use stream::{read_exact, Stream, StreamStatus};
pub use utf8::{Utf8Source, Utf8Stream};
