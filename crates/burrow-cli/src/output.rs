//! Index writer that prints every finished unit as one JSON line.

use burrow_analyzer::{FieldValue, IndexError, IndexWriter, UnitId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

/// One output line.
#[derive(Debug, Serialize)]
pub struct UnitRecord {
    pub path: String,
    pub depth: u32,
    pub mtime: i64,
    pub fields: BTreeMap<String, Vec<FieldValue>>,
    pub text_length: usize,
}

struct State<W> {
    out: W,
    next_id: u64,
    open: HashMap<u64, UnitRecord>,
    written: usize,
}

/// Writes finished units to `W`; nested units come before their container.
pub struct JsonLinesWriter<W: Write + Send> {
    state: Mutex<State<W>>,
}

impl<W: Write + Send> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(State {
                out,
                next_id: 0,
                open: HashMap::new(),
                written: 0,
            }),
        }
    }

    /// Units written so far.
    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }
}

impl<W: Write + Send> IndexWriter for JsonLinesWriter<W> {
    fn start_unit(&self, path: &str, mtime: i64, depth: u32) -> Option<UnitId> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.open.insert(
            id,
            UnitRecord {
                path: path.to_string(),
                depth,
                mtime,
                fields: BTreeMap::new(),
                text_length: 0,
            },
        );
        Some(UnitId(id))
    }

    fn add_field(&self, unit: UnitId, name: &str, value: &FieldValue) {
        if let Some(record) = self.state.lock().open.get_mut(&unit.0) {
            record
                .fields
                .entry(name.to_string())
                .or_default()
                .push(value.clone());
        }
    }

    fn add_text(&self, unit: UnitId, text: &str) {
        if let Some(record) = self.state.lock().open.get_mut(&unit.0) {
            record.text_length += text.len();
        }
    }

    fn finish_unit(&self, unit: UnitId) {
        let mut state = self.state.lock();
        let Some(record) = state.open.remove(&unit.0) else {
            return;
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "Cannot serialize unit");
                return;
            }
        };
        match writeln!(state.out, "{}", line) {
            Ok(()) => state.written += 1,
            Err(e) => tracing::warn!(path = %record.path, error = %e, "Cannot write unit"),
        }
    }

    fn delete_entries(&self, _paths: &[String]) -> Result<(), IndexError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), IndexError> {
        self.state.lock().out.flush()?;
        Ok(())
    }

    fn items_in_cache(&self) -> usize {
        0
    }

    fn optimize(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
