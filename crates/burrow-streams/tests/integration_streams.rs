//! Integration tests chaining burrow sources and decoders.

use std::io::Write;

use burrow_streams::{
    Bz2Source, FileSource, GzipSource, MemoryStream, Stream, StreamStatus, SubSource, Utf8Source,
};
use tempfile::tempdir;

fn drain(stream: &mut dyn Stream<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = stream.read(1, 0).unwrap();
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(chunk);
    }
    out
}

fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A bzip2 stream inside a gzip stream decodes through two decoders
#[test]
fn test_nested_decoders() {
    let text: Vec<u8> = (0..5000).flat_map(|i| format!("line {}\n", i).into_bytes()).collect();
    let mut outer = MemoryStream::from_bytes(gzip(&bzip2(&text)));

    let mut gz = GzipSource::open(&mut outer).unwrap();
    let mut bz = Bz2Source::open(&mut gz).unwrap();
    let decoded = drain(&mut bz);

    assert_eq!(decoded, text);
    assert_eq!(bz.status(), StreamStatus::Eof);
    assert_eq!(bz.size(), text.len() as i64);
}

/// Files report their size up front and can be rewound within the buffer
#[test]
fn test_file_source_rewind() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("data.bin");
    std::fs::write(&path, b"0123456789abcdef").unwrap();

    let mut stream = FileSource::open(&path).unwrap();
    assert_eq!(stream.size(), 16);
    assert_eq!(stream.read(4, 4).unwrap(), b"0123");
    assert_eq!(stream.reset(0), 0);
    assert_eq!(stream.read(6, 6).unwrap(), b"012345");
    assert_eq!(stream.skip(100).unwrap(), 10);
    assert_eq!(stream.status(), StreamStatus::Eof);
}

/// A window never takes more from its parent than its length
#[test]
fn test_sub_source_window() {
    let mut parent = MemoryStream::from_bytes(b"header|BODY|trailer".to_vec());
    assert_eq!(parent.skip(7).unwrap(), 7);
    {
        let mut window = SubSource::open(&mut parent, 4);
        assert_eq!(window.size(), 4);
        assert_eq!(drain(&mut window), b"BODY");
    }
    assert_eq!(parent.position(), 11);
    assert_eq!(drain(&mut parent), b"|trailer");
}

/// Characters decode across multi-byte sequences
#[test]
fn test_utf8_chars() {
    let mut bytes = MemoryStream::from_bytes("h\u{e9}llo \u{1f600}".as_bytes().to_vec());
    let mut chars = Utf8Source::open(&mut bytes);
    let mut out = String::new();
    loop {
        let chunk = chars.read(1, 0).unwrap();
        if chunk.is_empty() {
            break;
        }
        out.extend(chunk.iter());
    }
    assert_eq!(out, "h\u{e9}llo \u{1f600}");
    assert_eq!(chars.size(), 7);
}
