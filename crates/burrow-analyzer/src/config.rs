//! Analyzer configuration.

use serde::{Deserialize, Serialize};

/// An external program that turns a recognized format into text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Name recorded on analyzed units
    pub name: String,

    /// Leading bytes that select this helper
    pub magic: String,

    /// Program and arguments; the unit's data arrives on standard input
    pub command: Vec<String>,
}

/// Settings consulted when analyzers are registered and run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyzer names that must not be activated
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Compute a SHA-256 digest of every unit
    #[serde(default)]
    pub enable_digest: bool,

    /// Deepest nesting level that is analyzed
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Bytes offered to end analyzers for format detection
    #[serde(default = "default_header_size")]
    pub header_size: usize,

    /// Text kept per unit, in bytes
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,

    /// Markup parsed per unit, in bytes
    #[serde(default = "default_markup_limit")]
    pub markup_limit: usize,

    /// External decoder helpers
    #[serde(default)]
    pub helpers: Vec<HelperConfig>,
}

fn default_max_depth() -> u32 {
    32
}

fn default_header_size() -> usize {
    1024
}

fn default_max_text_bytes() -> usize {
    1024 * 1024
}

fn default_markup_limit() -> usize {
    1_000_000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            enable_digest: false,
            max_depth: default_max_depth(),
            header_size: default_header_size(),
            max_text_bytes: default_max_text_bytes(),
            markup_limit: default_markup_limit(),
            helpers: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Whether the analyzer called `name` was switched off.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d == name)
    }
}
