//! Integration tests for the analysis pipeline over nested and typed content.

use std::io::Write;

use burrow_analyzer::{
    AnalyzerConfig, AnalyzerRegistry, FieldValue, HelperConfig, IndexError, IndexWriter,
    StreamAnalyzer, UnitId,
};
use burrow_streams::MemoryStream;
use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
struct Unit {
    path: String,
    depth: u32,
    fields: Vec<(String, FieldValue)>,
    text: String,
    finished: bool,
}

impl Unit {
    fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::Text(t) if n == name => Some(t.as_str()),
            _ => None,
        })
    }

    fn int_field(&self, name: &str) -> Option<i64> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::Integer(i) if n == name => Some(*i),
            _ => None,
        })
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.to_string())
            .collect()
    }
}

/// Collects everything written, in start order.
#[derive(Default)]
struct Collector {
    units: Mutex<Vec<Unit>>,
}

impl Collector {
    fn unit(&self, path: &str) -> Unit {
        self.units
            .lock()
            .iter()
            .find(|u| u.path == path)
            .cloned()
            .unwrap_or_else(|| panic!("no unit {}", path))
    }

    fn paths(&self) -> Vec<(String, u32)> {
        self.units
            .lock()
            .iter()
            .map(|u| (u.path.clone(), u.depth))
            .collect()
    }
}

impl IndexWriter for Collector {
    fn start_unit(&self, path: &str, _mtime: i64, depth: u32) -> Option<UnitId> {
        let mut units = self.units.lock();
        units.push(Unit {
            path: path.to_string(),
            depth,
            ..Default::default()
        });
        Some(UnitId(units.len() as u64 - 1))
    }

    fn add_field(&self, unit: UnitId, name: &str, value: &FieldValue) {
        self.units.lock()[unit.0 as usize]
            .fields
            .push((name.to_string(), value.clone()));
    }

    fn add_text(&self, unit: UnitId, text: &str) {
        self.units.lock()[unit.0 as usize].text.push_str(text);
    }

    fn finish_unit(&self, unit: UnitId) {
        self.units.lock()[unit.0 as usize].finished = true;
    }

    fn delete_entries(&self, _paths: &[String]) -> Result<(), IndexError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), IndexError> {
        Ok(())
    }

    fn items_in_cache(&self) -> usize {
        0
    }

    fn optimize(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// ustar archive with regular files only.
fn tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut block = [0u8; 512];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[100..107].copy_from_slice(b"0000644");
        block[124..135].copy_from_slice(format!("{:011o}", data.len()).as_bytes());
        block[136..147].copy_from_slice(b"14000000000");
        block[148..156].copy_from_slice(b"        ");
        block[156] = b'0';
        block[257..263].copy_from_slice(b"ustar\0");
        let sum: u32 = block.iter().map(|&b| b as u32).sum();
        block[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
        out.extend_from_slice(&block);
        out.extend_from_slice(data);
        let pad = (512 - data.len() % 512) % 512;
        out.resize(out.len() + pad, 0);
    }
    out.resize(out.len() + 1024, 0);
    out
}

fn gzip(data: &[u8], name: Option<&str>) -> Vec<u8> {
    let mut builder = flate2::GzBuilder::new();
    if let Some(name) = name {
        builder = builder.filename(name);
    }
    let mut encoder = builder.write(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn analyze(config: AnalyzerConfig, path: &str, data: Vec<u8>) -> Collector {
    let collector = Collector::default();
    let mut analyzer = StreamAnalyzer::new(AnalyzerRegistry::with_defaults(config));
    let mut input = MemoryStream::from_bytes(data);
    analyzer
        .analyze_stream(path, 1_700_000_000, &mut input, &collector)
        .unwrap();
    collector
}

/// Test a compressed archive nesting compressed and typed entries
#[test]
fn test_nested_archive() {
    let playlist = b"#EXTM3U\n#EXTINF:120,First\nfirst.mp3\n\nsecond.ogg\n";
    let archive = tar(&[
        ("docs/readme.txt", &b"Burrow indexes nested content\n"[..]),
        ("notes.txt.bz2", &bzip2(b"compressed notes")[..]),
        ("mix.m3u", &playlist[..]),
    ]);
    let bundle = gzip(&archive, None);
    let bundle_len = bundle.len() as i64;

    let collector = analyze(AnalyzerConfig::default(), "/home/u/bundle.tar.gz", bundle);

    assert_eq!(
        collector.paths(),
        [
            ("/home/u/bundle.tar.gz".to_string(), 0),
            ("/home/u/bundle.tar.gz/bundle.tar".to_string(), 1),
            ("/home/u/bundle.tar.gz/bundle.tar/docs/readme.txt".to_string(), 2),
            ("/home/u/bundle.tar.gz/bundle.tar/notes.txt.bz2".to_string(), 2),
            ("/home/u/bundle.tar.gz/bundle.tar/notes.txt.bz2/notes.txt".to_string(), 3),
            ("/home/u/bundle.tar.gz/bundle.tar/mix.m3u".to_string(), 2),
        ]
    );
    assert!(collector.units.lock().iter().all(|u| u.finished));

    let root = collector.unit("/home/u/bundle.tar.gz");
    assert_eq!(root.text_field("mimetype"), Some("application/gzip"));
    assert_eq!(root.int_field("size"), Some(bundle_len));

    let archive_unit = collector.unit("/home/u/bundle.tar.gz/bundle.tar");
    assert_eq!(archive_unit.int_field("archive.entry_count"), Some(3));
    assert_eq!(archive_unit.int_field("size"), Some(archive.len() as i64));

    let readme = collector.unit("/home/u/bundle.tar.gz/bundle.tar/docs/readme.txt");
    assert_eq!(readme.text, "Burrow indexes nested content\n");
    assert_eq!(readme.text_field("mimetype"), Some("text/plain"));

    let notes = collector.unit("/home/u/bundle.tar.gz/bundle.tar/notes.txt.bz2/notes.txt");
    assert_eq!(notes.text, "compressed notes");
    assert_eq!(notes.int_field("size"), Some(16));

    let mix = collector.unit("/home/u/bundle.tar.gz/bundle.tar/mix.m3u");
    assert_eq!(mix.text_field("mimetype"), Some("audio/x-mpegurl"));
    assert_eq!(mix.text_field("content.format_subtype"), Some("extended"));
    assert_eq!(mix.int_field("media.track_count"), Some(2));
    assert_eq!(mix.all("content.links"), ["first.mp3", "second.ogg"]);
}

/// Test the stored gzip file name names the nested unit
#[test]
fn test_gzip_stored_name() {
    let data = gzip(b"quarterly numbers", Some("report.txt"));
    let collector = analyze(AnalyzerConfig::default(), "/r/download.gz", data);

    let root = collector.unit("/r/download.gz");
    assert_eq!(root.text_field("archive.original_name"), Some("report.txt"));
    let inner = collector.unit("/r/download.gz/report.txt");
    assert_eq!(inner.text, "quarterly numbers");
}

/// Test XML documents get structure fields and character data
#[test]
fn test_xml_document() {
    let doc = br#"<?xml version="1.0" encoding="UTF-8"?>
<feed><title>Updates</title><entry>first entry</entry></feed>"#;
    let collector = analyze(AnalyzerConfig::default(), "/f/feed.xml", doc.to_vec());

    let unit = collector.unit("/f/feed.xml");
    assert_eq!(unit.text_field("mimetype"), Some("text/xml"));
    assert_eq!(unit.text_field("document.root"), Some("feed"));
    assert_eq!(unit.text_field("document.encoding"), Some("UTF-8"));
    assert_eq!(unit.text_field("content.title"), Some("Updates"));
    assert_eq!(unit.text, "Updates first entry");
}

/// Test HTML title and links come from replayed markup
#[test]
fn test_html_document() {
    let doc = b"<!DOCTYPE html>\n<html><head><title>Burrow</title></head>\
<body><p>Find <a href=\"https://example.com/a\">this</a> and <a href=\"/b\">that</a></p></body></html>";
    let collector = analyze(AnalyzerConfig::default(), "/w/index.html", doc.to_vec());

    let unit = collector.unit("/w/index.html");
    assert_eq!(unit.text_field("mimetype"), Some("text/html"));
    assert_eq!(unit.text_field("content.title"), Some("Burrow"));
    assert_eq!(unit.all("content.links"), ["https://example.com/a", "/b"]);
}

/// Test ID3v2 tags are read without disturbing later analyzers
#[test]
fn test_id3_tag() {
    let mut frames = Vec::new();
    for (id, text) in [(b"TIT2", "Night Drive"), (b"TPE1", "The Burrows")] {
        frames.extend_from_slice(id);
        frames.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
        frames.extend_from_slice(&[0, 0, 3]);
        frames.extend_from_slice(text.as_bytes());
    }
    let mut data = b"ID3\x03\x00\x00\x00\x00".to_vec();
    data.extend_from_slice(&[(frames.len() >> 7) as u8 & 0x7f, frames.len() as u8 & 0x7f]);
    data.extend_from_slice(&frames);
    data.extend_from_slice(&[0u8; 4096]);

    let collector = analyze(AnalyzerConfig::default(), "/m/track.mp3", data);

    let unit = collector.unit("/m/track.mp3");
    assert_eq!(unit.text_field("content.title"), Some("Night Drive"));
    assert_eq!(unit.text_field("media.artist"), Some("The Burrows"));
    assert_eq!(unit.text_field("mimetype"), Some("audio/mpeg"));
}

/// Test the digest covers every byte exactly once
#[test]
fn test_digest_enabled() {
    let config = AnalyzerConfig {
        enable_digest: true,
        ..Default::default()
    };
    let collector = analyze(config, "/d/abc.txt", b"abc".to_vec());

    let unit = collector.unit("/d/abc.txt");
    assert_eq!(
        unit.text_field("content.sha256"),
        Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
}

/// Test a configured helper converts matching data to text
#[cfg(unix)]
#[test]
fn test_helper_program() {
    let config = AnalyzerConfig {
        helpers: vec![HelperConfig {
            name: "upper".to_string(),
            magic: "%UP".to_string(),
            command: vec!["tr".to_string(), "a-z".to_string(), "A-Z".to_string()],
        }],
        ..Default::default()
    };
    let collector = analyze(config, "/h/shout.up", b"%UP quiet words".to_vec());

    let unit = collector.unit("/h/shout.up");
    assert_eq!(unit.text_field("helper.name"), Some("upper"));
    assert_eq!(unit.text, "%UP QUIET WORDS");
}
