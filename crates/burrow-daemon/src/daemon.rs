//! Daemon lifecycle management.

use anyhow::{Context, Result};
use burrow_analyzer::{AnalyzerRegistry, IndexManager, StreamAnalyzer};
use burrow_core::{DaemonConfig, Interface};
use burrow_indexer::{FileWatcher, FilterManager, IndexScheduler, MemoryIndex, WalkLister};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: DaemonConfig,
}

impl Daemon {
    /// Create a daemon from the default or an explicit configuration file
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => DaemonConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => DaemonConfig::load(),
        };

        // Ensure data directories exist
        config
            .ensure_dirs()
            .context("Failed to create data directories")?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Run the daemon until SIGINT or SIGTERM
    pub async fn run(&self) -> Result<()> {
        // Check single instance
        self.acquire_pid_lock()?;

        let index_path = self.config.index_path();
        tracing::info!(
            data_dir = %self.config.data_dir.display(),
            index = %index_path.display(),
            "Daemon starting"
        );

        let index = Arc::new(MemoryIndex::open(&index_path).context("Failed to open index")?);
        let filter = Arc::new(
            FilterManager::new(&self.config.exclude_patterns)
                .context("Invalid exclude patterns")?,
        );
        let analyzer = StreamAnalyzer::new(AnalyzerRegistry::with_defaults(
            self.config.analyzers.clone(),
        ));
        tracing::info!(
            analyzers = analyzer.registry().analyzers().len(),
            fields = analyzer.fields().len(),
            "Analyzers registered"
        );

        let scheduler = Arc::new(IndexScheduler::new(
            analyzer,
            index.clone(),
            Box::new(WalkLister::new(filter.clone(), self.config.respect_gitignore)),
            filter,
            self.config.scheduler_options(),
        ));
        let handle = scheduler.handle();
        let interface = Interface::new(index.clone(), handle.clone());

        let watcher = Arc::new(Mutex::new(FileWatcher::new(
            self.config.watcher_options(),
            handle.queue().clone(),
        )));
        {
            let watcher = Arc::clone(&watcher);
            interface.on_directories_changed(move |old, new| {
                let mut watcher = watcher.lock();
                for dir in old.difference(new) {
                    if let Err(e) = watcher.unwatch(Path::new(dir)) {
                        tracing::warn!(dir = %dir, error = %e, "Failed to stop watching");
                    }
                }
                for dir in new.difference(old) {
                    if let Err(e) = watcher.watch(Path::new(dir)) {
                        tracing::warn!(dir = %dir, error = %e, "Failed to watch directory");
                    }
                }
            });
        }
        interface
            .set_indexed_directories(&self.config.indexed_dirs)
            .context("Invalid indexed directories")?;

        if self.config.index_on_start {
            interface.start_indexing();
        }

        let worker = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        signals::wait_for_shutdown().await;
        handle.shutdown();
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }

        // Flush anything a stopped pass left cached
        if let Err(e) = index.writer().commit() {
            tracing::warn!(error = %e, "Final commit failed");
        }
        tracing::info!(status = ?interface.get_status(), "Final status");

        self.cleanup();
        Ok(())
    }

    /// Acquire PID lock to ensure single instance
    fn acquire_pid_lock(&self) -> Result<()> {
        let pid_file = &self.config.pid_file;

        if pid_file.exists() {
            // Read existing PID
            if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if pid != std::process::id() && is_process_running(pid) {
                        anyhow::bail!("Daemon already running (PID: {})", pid);
                    }
                }
            }
            // Stale PID file, remove it
            std::fs::remove_file(pid_file)?;
        }

        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write {}", pid_file.display()))?;

        tracing::debug!(pid = std::process::id(), "PID lock acquired");

        Ok(())
    }

    /// Cleanup resources on shutdown
    fn cleanup(&self) {
        tracing::info!("Cleaning up...");

        if self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }

        tracing::info!("Cleanup complete");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        // Ensure cleanup happens even on panic
        if self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }
    }
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    // kill(pid, 0) only checks that the process exists
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
