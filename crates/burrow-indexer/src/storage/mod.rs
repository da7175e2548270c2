//! In-memory index store with optional JSON persistence.
//!
//! Units written through the [`IndexWriter`] side are cached until
//! [`commit`](IndexWriter::commit), which applies pending deletions, makes the
//! cached units visible to readers and, when a snapshot path is configured,
//! rewrites the snapshot atomically.

use crate::filter::is_within;
use crate::IndexerError;
use burrow_analyzer::{
    FieldValue, IndexError, IndexManager, IndexReader, IndexWriter, IndexedDocument, Query, UnitId,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;
const FRAGMENT_CHARS: usize = 200;

/// A unit as kept by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUnit {
    path: String,
    mtime: i64,
    depth: u32,
    fields: Vec<(String, FieldValue)>,
    #[serde(default)]
    text: String,
}

impl StoredUnit {
    fn matches(&self, query: &Query) -> bool {
        let values: Vec<String> = self.fields.iter().map(|(_, v)| v.to_string()).collect();
        let haystacks = std::iter::once(self.path.as_str())
            .chain(values.iter().map(String::as_str))
            .chain(std::iter::once(self.text.as_str()));
        query.matches(haystacks)
    }

    fn to_document(&self) -> IndexedDocument {
        IndexedDocument {
            path: self.path.clone(),
            mtime: self.mtime,
            depth: self.depth,
            fields: self.fields.clone(),
            fragment: self.text.chars().take(FRAGMENT_CHARS).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    units: Vec<StoredUnit>,
}

#[derive(Debug, Default)]
struct WriterState {
    next_id: u64,
    pending: HashMap<u64, StoredUnit>,
    cache: Vec<StoredUnit>,
    deletions: Vec<String>,
}

/// Index store keeping committed units in a path-ordered map.
#[derive(Debug)]
pub struct MemoryIndex {
    snapshot_path: Option<PathBuf>,
    writer: Mutex<WriterState>,
    committed: RwLock<BTreeMap<String, StoredUnit>>,
}

impl MemoryIndex {
    /// Store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            writer: Mutex::new(WriterState::default()),
            committed: RwLock::new(BTreeMap::new()),
        }
    }

    /// Store persisted at `path`, loading the snapshot if it exists.
    pub fn open(path: &Path) -> Result<Self, IndexerError> {
        let mut committed = BTreeMap::new();
        if path.exists() {
            let json = std::fs::read_to_string(path)?;
            let snapshot: Snapshot = serde_json::from_str(&json)?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(IndexerError::Serialization(format!(
                    "unsupported snapshot version {}",
                    snapshot.version
                )));
            }
            for unit in snapshot.units {
                committed.insert(unit.path.clone(), unit);
            }
            info!(path = ?path, units = committed.len(), "Loaded index snapshot");
        }
        Ok(Self {
            snapshot_path: Some(path.to_path_buf()),
            writer: Mutex::new(WriterState::default()),
            committed: RwLock::new(committed),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Write the committed units to the snapshot file, if any.
    fn save(&self, committed: &BTreeMap<String, StoredUnit>) -> Result<(), IndexError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            units: committed.values().cloned().collect(),
        };
        let json =
            serde_json::to_vec(&snapshot).map_err(|e| IndexError::Storage(e.to_string()))?;

        // Atomic write: write to temp file, then rename
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index.json".to_string());
        let temp_path = dir.join(format!(".{}.tmp", file_name));
        std::fs::write(&temp_path, &json)?;
        std::fs::rename(&temp_path, path)?;

        debug!(path = ?path, size = json.len(), "Saved index snapshot");
        Ok(())
    }
}

/// Remove every key equal to `prefix` or below it.
fn remove_below(map: &mut BTreeMap<String, StoredUnit>, prefix: &str) -> usize {
    let doomed: Vec<String> = map
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .filter(|(k, _)| is_within(k, prefix))
        .map(|(k, _)| k.clone())
        .collect();
    for key in &doomed {
        map.remove(key);
    }
    doomed.len()
}

impl IndexWriter for MemoryIndex {
    fn start_unit(&self, path: &str, mtime: i64, depth: u32) -> Option<UnitId> {
        if path.is_empty() || path.contains('\0') {
            warn!(path, "Refusing unit with invalid path");
            return None;
        }
        let mut state = self.writer.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(
            id,
            StoredUnit {
                path: path.to_string(),
                mtime,
                depth,
                fields: Vec::new(),
                text: String::new(),
            },
        );
        Some(UnitId(id))
    }

    fn add_field(&self, unit: UnitId, name: &str, value: &FieldValue) {
        if let Some(stored) = self.writer.lock().pending.get_mut(&unit.0) {
            stored.fields.push((name.to_string(), value.clone()));
        }
    }

    fn add_text(&self, unit: UnitId, text: &str) {
        if let Some(stored) = self.writer.lock().pending.get_mut(&unit.0) {
            stored.text.push_str(text);
        }
    }

    fn finish_unit(&self, unit: UnitId) {
        let mut state = self.writer.lock();
        if let Some(stored) = state.pending.remove(&unit.0) {
            state.cache.push(stored);
        }
    }

    fn delete_entries(&self, paths: &[String]) -> Result<(), IndexError> {
        let mut state = self.writer.lock();
        state
            .cache
            .retain(|unit| !paths.iter().any(|p| is_within(&unit.path, p)));
        state.deletions.extend(paths.iter().cloned());
        Ok(())
    }

    fn commit(&self) -> Result<(), IndexError> {
        let (deletions, cache) = {
            let mut state = self.writer.lock();
            (
                std::mem::take(&mut state.deletions),
                std::mem::take(&mut state.cache),
            )
        };

        let mut committed = self.committed.write();
        let mut removed = 0;
        for prefix in &deletions {
            removed += remove_below(&mut committed, prefix);
        }
        let added = cache.len();
        for unit in cache {
            committed.insert(unit.path.clone(), unit);
        }
        info!(added, removed, total = committed.len(), "Index committed");
        self.save(&committed)
    }

    fn items_in_cache(&self) -> usize {
        self.writer.lock().cache.len()
    }

    fn optimize(&self) -> Result<(), IndexError> {
        let mut state = self.writer.lock();
        state.pending.shrink_to_fit();
        state.cache.shrink_to_fit();
        debug!(pending = state.pending.len(), "Index optimized");
        Ok(())
    }
}

impl IndexReader for MemoryIndex {
    fn get_files(&self, depth: u32) -> Result<BTreeMap<String, i64>, IndexError> {
        Ok(self
            .committed
            .read()
            .values()
            .filter(|unit| unit.depth == depth)
            .map(|unit| (unit.path.clone(), unit.mtime))
            .collect())
    }

    fn count_hits(&self, query: &Query) -> usize {
        self.committed
            .read()
            .values()
            .filter(|unit| unit.matches(query))
            .count()
    }

    fn query(&self, query: &Query, max: usize, offset: usize) -> Vec<IndexedDocument> {
        self.committed
            .read()
            .values()
            .filter(|unit| unit.matches(query))
            .skip(offset)
            .take(max)
            .map(StoredUnit::to_document)
            .collect()
    }

    fn count_documents(&self) -> usize {
        self.committed.read().len()
    }
}

impl IndexManager for MemoryIndex {
    fn writer(&self) -> &dyn IndexWriter {
        self
    }

    fn reader(&self) -> &dyn IndexReader {
        self
    }
}
