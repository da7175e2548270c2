//! Built-in analyzers.

pub mod au;
pub mod bz2;
pub mod digest;
pub mod event;
pub mod gzip;
pub mod helper;
pub mod html;
pub mod id3v2;
pub mod m3u;
pub mod mime;
pub mod tar;
pub mod text;
pub mod xattr;
pub mod xml;

use burrow_streams::{Stream, StreamError};

/// Name for the decoded content of a compressed file: the first matching
/// suffix is replaced, otherwise the name is kept.
pub(crate) fn decoded_name(file_name: &str, suffixes: &[(&str, &str)]) -> String {
    let lower = file_name.to_ascii_lowercase();
    for (suffix, replacement) in suffixes {
        if lower.len() > suffix.len() && lower.ends_with(suffix) {
            let stem = &file_name[..file_name.len() - suffix.len()];
            return format!("{}{}", stem, replacement);
        }
    }
    file_name.to_string()
}

/// Skip a UTF-8 byte order mark and leading whitespace.
pub(crate) fn skip_bom_and_space(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

/// Read up to `limit` bytes. The flag is false when more data followed.
pub(crate) fn read_limited(
    input: &mut dyn Stream<u8>,
    limit: usize,
) -> Result<(Vec<u8>, bool), StreamError> {
    let mut data = Vec::new();
    loop {
        let want = limit + 1 - data.len();
        let chunk = input.read(1, want)?;
        if chunk.is_empty() {
            return Ok((data, true));
        }
        data.extend_from_slice(chunk);
        if data.len() > limit {
            data.truncate(limit);
            return Ok((data, false));
        }
    }
}
