//! POSIX ustar and GNU tar archives.
//!
//! Every regular file in the archive is analyzed as a nested unit through a
//! window over the archive stream. Other entry types are skipped.

use burrow_streams::{read_exact, Stream, StreamError, StreamStatus, SubSource};
use tracing::debug;

use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisError, AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister, FieldType};

/// Number of regular files found in the archive.
pub const ENTRY_COUNT_FIELD: &str = "archive.entry_count";

const BLOCK: usize = 512;
const MAX_LONG_NAME: i64 = 64 * 1024;

pub struct TarEndFactory;

impl AnalyzerFactory for TarEndFactory {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(ENTRY_COUNT_FIELD, FieldType::Integer, 1);
    }
}

impl EndAnalyzerFactory for TarEndFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(TarEndAnalyzer)
    }
}

pub struct TarEndAnalyzer;

/// A parsed 512-byte header block.
struct Header {
    name: String,
    size: i64,
    mtime: i64,
    typeflag: u8,
}

impl EndAnalyzer for TarEndAnalyzer {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        header.len() >= BLOCK && header[..BLOCK].iter().any(|&b| b != 0) && checksum_ok(&header[..BLOCK])
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        result.set_mime_type("application/x-tar");
        let mut entries = 0i64;
        let mut long_name: Option<String> = None;

        loop {
            let block = read_exact(input, BLOCK)?;
            if block.len() < BLOCK {
                return Err(AnalyzerError::Format("truncated header block".to_string()));
            }
            if block.iter().all(|&b| b == 0) {
                break;
            }
            if !checksum_ok(&block) {
                return Err(AnalyzerError::Format("bad header checksum".to_string()));
            }
            let mut header = parse_header(&block)?;
            let padded = padded_size(header.size)
                .ok_or_else(|| AnalyzerError::Format("entry size out of range".to_string()))?;

            match header.typeflag {
                b'L' => {
                    let len = header.size.min(MAX_LONG_NAME) as usize;
                    let data = if len == 0 { Vec::new() } else { read_exact(input, len)? };
                    if data.len() < len {
                        return Err(StreamError::UnexpectedEof("long name truncated".to_string()).into());
                    }
                    long_name = Some(cstr(&data));
                    skip_exact(input, padded - len as i64)?;
                }
                b'0' | b'\0' | b'7' => {
                    if let Some(name) = long_name.take() {
                        header.name = name;
                    }
                    let name = header.name.trim_start_matches("./").trim_start_matches('/').to_string();
                    let start = input.position();
                    if !name.is_empty() && !name.ends_with('/') {
                        entries += 1;
                        let mut entry = SubSource::open(&mut *input, header.size);
                        if let Err(e) = result.index_child(&name, header.mtime, &mut entry) {
                            debug!(path = result.path(), entry = %name, error = %e, "Archive entry failed");
                        }
                        drop(entry);
                        if input.status() == StreamStatus::Error {
                            let source = input
                                .error()
                                .cloned()
                                .unwrap_or_else(|| StreamError::Io("archive stream failed".to_string()));
                            return Err(AnalysisError::Stream {
                                path: result.path().to_string(),
                                source,
                            }
                            .into());
                        }
                    }
                    let consumed = input.position() - start;
                    skip_exact(input, padded - consumed)?;
                }
                _ => {
                    long_name = None;
                    skip_exact(input, padded)?;
                }
            }
        }

        result.add_field(ENTRY_COUNT_FIELD, entries);
        Ok(())
    }
}

fn skip_exact(input: &mut dyn Stream<u8>, n: i64) -> Result<(), AnalyzerError> {
    if n <= 0 {
        return Ok(());
    }
    if input.skip(n)? < n {
        return Err(StreamError::UnexpectedEof("archive truncated".to_string()).into());
    }
    Ok(())
}

/// `size` rounded up to whole blocks, or `None` when that overflows.
fn padded_size(size: i64) -> Option<i64> {
    let block = BLOCK as i64;
    size.checked_add(block - 1).map(|s| s / block * block)
}

fn parse_header(block: &[u8]) -> Result<Header, AnalyzerError> {
    let size = parse_number(&block[124..136])
        .filter(|s| *s >= 0)
        .ok_or_else(|| AnalyzerError::Format("bad entry size".to_string()))?;
    let mtime = parse_number(&block[136..148]).unwrap_or(0);
    let mut name = cstr(&block[0..100]);
    if &block[257..262] == b"ustar" {
        let prefix = cstr(&block[345..500]);
        if !prefix.is_empty() {
            name = format!("{}/{}", prefix, name);
        }
    }
    Ok(Header {
        name,
        size,
        mtime,
        typeflag: block[156],
    })
}

/// Octal number, or GNU base-256 when the high bit of the first byte is set.
fn parse_number(field: &[u8]) -> Option<i64> {
    if field.first().is_some_and(|b| b & 0x80 != 0) {
        let mut value: i64 = (field[0] & 0x7f) as i64;
        for &b in &field[1..] {
            value = value.checked_mul(256)?.checked_add(b as i64)?;
        }
        return Some(value);
    }
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|b| *b == b' ')
        .take_while(|b| (b'0'..=b'7').contains(b))
        .collect();
    if digits.is_empty() {
        return Some(0);
    }
    let text = std::str::from_utf8(&digits).ok()?;
    i64::from_str_radix(text, 8).ok()
}

fn checksum_ok(block: &[u8]) -> bool {
    let Some(stored) = parse_number(&block[148..156]) else {
        return false;
    };
    let mut unsigned: i64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in block.iter().enumerate() {
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += b as i64;
        signed += (b as i8) as i64;
    }
    stored == unsigned || stored == signed
}

fn cstr(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Minimal archive writer shared by tests.
#[cfg(test)]
pub(crate) fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut block = [0u8; BLOCK];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[100..107].copy_from_slice(b"0000644");
        block[108..115].copy_from_slice(b"0000000");
        block[116..123].copy_from_slice(b"0000000");
        block[124..135].copy_from_slice(format!("{:011o}", data.len()).as_bytes());
        block[136..147].copy_from_slice(b"14000000000");
        block[156] = b'0';
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        write_checksum(&mut block);
        out.extend_from_slice(&block);
        out.extend_from_slice(data);
        out.resize(out.len() + (data.len() + BLOCK - 1) / BLOCK * BLOCK - data.len(), 0);
    }
    out.resize(out.len() + 2 * BLOCK, 0);
    out
}

#[cfg(test)]
fn write_checksum(block: &mut [u8]) {
    block[148..156].copy_from_slice(b"        ");
    let sum: u32 = block.iter().map(|&b| b as u32).sum();
    block[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
}
