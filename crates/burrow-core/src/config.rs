//! Configuration for the burrow daemon.

use burrow_analyzer::AnalyzerConfig;
use burrow_indexer::{SchedulerOptions, WatcherOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::CoreError;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Data directory for the index and configuration
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Index snapshot; `<data_dir>/index.json` when unset
    #[serde(default)]
    pub index_file: Option<PathBuf>,

    /// Directories to index
    #[serde(default)]
    pub indexed_dirs: Vec<String>,

    /// Gitignore-style patterns excluded below every indexed directory
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Scheduler tick interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cached units that force a commit during a pass
    #[serde(default = "default_commit_threshold")]
    pub commit_threshold: usize,

    /// File watcher debounce in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Run a full pass when the daemon starts
    #[serde(default = "default_true")]
    pub index_on_start: bool,

    /// Honour .gitignore files while walking
    #[serde(default)]
    pub respect_gitignore: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Analyzer settings
    #[serde(default)]
    pub analyzers: AnalyzerConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".burrow")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/burrow.pid")
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_commit_threshold() -> usize {
    10_000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pid_file: default_pid_file(),
            index_file: None,
            indexed_dirs: Vec::new(),
            exclude_patterns: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            commit_threshold: default_commit_threshold(),
            debounce_ms: default_debounce_ms(),
            index_on_start: true,
            respect_gitignore: false,
            log_level: default_log_level(),
            analyzers: AnalyzerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_path = default_data_dir().join("config.yaml");

        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_yaml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!(path = ?config_path, error = %e, "Failed to parse config file");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Failed to read config file");
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Path of the index snapshot
    pub fn index_path(&self) -> PathBuf {
        self.index_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("index.json"))
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            commit_threshold: self.commit_threshold,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            debounce_duration: Duration::from_millis(self.debounce_ms),
            recursive: true,
        }
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.index_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
