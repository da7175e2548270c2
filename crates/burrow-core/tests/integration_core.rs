//! Integration tests wiring a configuration file to a queryable index.

use std::fs;
use std::sync::Arc;

use burrow_analyzer::{AnalyzerRegistry, FieldValue, StreamAnalyzer};
use burrow_core::{DaemonConfig, Interface};
use burrow_indexer::{FilterManager, IndexScheduler, MemoryIndex, WalkLister};
use tempfile::tempdir;

/// A YAML configuration drives what gets indexed and how
#[test]
fn test_config_to_query() {
    let temp_dir = tempdir().unwrap();
    let tree = temp_dir.path().join("tree");
    fs::create_dir_all(tree.join("build")).unwrap();
    fs::write(tree.join("song.m3u"), "#EXTM3U\n#EXTINF:1,One\none.mp3\ntwo.mp3\n").unwrap();
    fs::write(tree.join("build/skip.txt"), "skip me").unwrap();

    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        format!(
            "data_dir: {}\nindexed_dirs: ['{}']\nexclude_patterns: ['build/']\nanalyzers:\n  enable_digest: true\n",
            temp_dir.path().join("data").display(),
            tree.display()
        ),
    )
    .unwrap();
    let config = DaemonConfig::load_from(&config_path).unwrap();
    config.ensure_dirs().unwrap();

    let index = Arc::new(MemoryIndex::open(&config.index_path()).unwrap());
    let filter = Arc::new(FilterManager::new(&config.exclude_patterns).unwrap());
    let scheduler = IndexScheduler::new(
        StreamAnalyzer::new(AnalyzerRegistry::with_defaults(config.analyzers.clone())),
        index.clone(),
        Box::new(WalkLister::new(filter.clone(), config.respect_gitignore)),
        filter,
        config.scheduler_options(),
    );
    let interface = Interface::new(index, scheduler.handle());
    interface
        .set_indexed_directories(&config.indexed_dirs)
        .unwrap();

    assert!(interface.start_indexing());
    scheduler.tick();

    assert_eq!(interface.get_status()["documents"], "1");
    let docs = interface.query("m3u", 10, 0);
    assert_eq!(docs.len(), 1);
    assert_eq!(
        docs[0].field("content.format_subtype"),
        Some(&FieldValue::Text("extended".into()))
    );
    assert_eq!(docs[0].field("media.track_count"), Some(&FieldValue::Integer(2)));
    assert!(docs[0].field("content.sha256").is_some());
    assert!(config.index_path().exists());
}
