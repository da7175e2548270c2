//! Index writer double for unit tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::index::{IndexError, IndexWriter, UnitId};
use crate::FieldValue;

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedUnit {
    pub path: String,
    pub mtime: i64,
    pub depth: u32,
    pub fields: Vec<(String, FieldValue)>,
    pub text: String,
    pub finished: bool,
}

impl RecordedUnit {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Records every call; declines units whose path contains `decline`.
#[derive(Default)]
pub(crate) struct RecordingWriter {
    pub units: Mutex<BTreeMap<u64, RecordedUnit>>,
    pub decline: Option<String>,
}

impl RecordingWriter {
    pub fn units(&self) -> Vec<RecordedUnit> {
        self.units.lock().values().cloned().collect()
    }

    pub fn unit(&self, path: &str) -> Option<RecordedUnit> {
        self.units.lock().values().find(|u| u.path == path).cloned()
    }
}

impl IndexWriter for RecordingWriter {
    fn start_unit(&self, path: &str, mtime: i64, depth: u32) -> Option<UnitId> {
        if self.decline.as_deref().is_some_and(|d| path.contains(d)) {
            return None;
        }
        let mut units = self.units.lock();
        let id = units.len() as u64;
        units.insert(
            id,
            RecordedUnit {
                path: path.to_string(),
                mtime,
                depth,
                ..Default::default()
            },
        );
        Some(UnitId(id))
    }

    fn add_field(&self, unit: UnitId, name: &str, value: &FieldValue) {
        if let Some(u) = self.units.lock().get_mut(&unit.0) {
            u.fields.push((name.to_string(), value.clone()));
        }
    }

    fn add_text(&self, unit: UnitId, text: &str) {
        if let Some(u) = self.units.lock().get_mut(&unit.0) {
            u.text.push_str(text);
        }
    }

    fn finish_unit(&self, unit: UnitId) {
        if let Some(u) = self.units.lock().get_mut(&unit.0) {
            u.finished = true;
        }
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
