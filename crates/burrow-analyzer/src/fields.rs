//! Field namespace shared by all analyzers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Size of the unit in bytes.
pub const SIZE_FIELD: &str = "size";
/// Detected MIME type of the unit.
pub const MIMETYPE_FIELD: &str = "mimetype";

/// Numeric handle for a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

/// Kind of values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
}

/// A value attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Description of a registered field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    /// Maximum number of values per unit, 0 for unlimited
    pub max_occurs: usize,
}

/// Maps field names to ids. Registering a name twice returns the first id.
#[derive(Debug, Clone)]
pub struct FieldRegister {
    fields: Vec<FieldInfo>,
    by_name: HashMap<String, FieldId>,
    size: FieldId,
    mimetype: FieldId,
}

impl Default for FieldRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegister {
    /// Register with the standard `size` and `mimetype` fields.
    pub fn new() -> Self {
        let mut register = Self {
            fields: Vec::new(),
            by_name: HashMap::new(),
            size: FieldId(0),
            mimetype: FieldId(0),
        };
        register.size = register.register(SIZE_FIELD, FieldType::Integer, 1);
        register.mimetype = register.register(MIMETYPE_FIELD, FieldType::Text, 1);
        register
    }

    /// Register `name`, or return its id if it already exists.
    pub fn register(&mut self, name: &str, field_type: FieldType, max_occurs: usize) -> FieldId {
        if let Some(&id) = self.by_name.get(name) {
            debug!(field = name, "Field already registered");
            return id;
        }
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldInfo {
            name: name.to_string(),
            field_type,
            max_occurs,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Id of a registered field.
    pub fn lookup(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).copied()
    }

    /// Description of a field.
    pub fn info(&self, id: FieldId) -> &FieldInfo {
        &self.fields[id.0 as usize]
    }

    /// Name of a field.
    pub fn name(&self, id: FieldId) -> &str {
        &self.info(id).name
    }

    pub fn size_field(&self) -> FieldId {
        self.size
    }

    pub fn mimetype_field(&self) -> FieldId {
        self.mimetype
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, info)| (FieldId(i as u32), info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fields() {
        let register = FieldRegister::new();
        assert_eq!(register.name(register.size_field()), "size");
        assert_eq!(register.name(register.mimetype_field()), "mimetype");
        assert_eq!(register.len(), 2);
    }

    #[test]
    fn test_register_same_name_twice() {
        let mut register = FieldRegister::new();
        let first = register.register("content.title", FieldType::Text, 1);
        let second = register.register("content.title", FieldType::Text, 0);

        assert_eq!(first, second);
        assert_eq!(register.len(), 3);
        assert_eq!(register.lookup("content.title"), Some(first));
        assert_eq!(register.info(first).max_occurs, 1);
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from(42).to_string(), "42");
        assert_eq!(FieldValue::from("abc").to_string(), "abc");
    }
}
