//! File system watcher feeding the scheduler's event queue.
//!
//! Uses FSEvents on macOS and inotify on Linux through `notify`, with
//! debouncing. Renames become a deletion of the old path plus a creation of
//! the new one.

use crate::queue::{EventQueue, FileEvent};
use crate::IndexerError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Debounce duration
    pub debounce_duration: Duration,
    /// Whether to watch recursively
    pub recursive: bool,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            recursive: true,
        }
    }
}

/// Debounced watcher over the indexed directories.
pub struct FileWatcher {
    options: WatcherOptions,
    queue: Arc<EventQueue>,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl FileWatcher {
    /// Create a watcher that pushes into `queue`.
    pub fn new(options: WatcherOptions, queue: Arc<EventQueue>) -> Self {
        Self {
            options,
            queue,
            debouncer: None,
        }
    }

    fn debouncer(&mut self) -> Result<&mut Debouncer<RecommendedWatcher, RecommendedCache>, IndexerError> {
        if self.debouncer.is_none() {
            let queue = Arc::clone(&self.queue);
            let debouncer = new_debouncer(
                self.options.debounce_duration,
                None,
                move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                    Ok(events) => {
                        for event in events {
                            for change in convert_event(&event.event) {
                                queue.push(change);
                            }
                        }
                    }
                    Err(errors) => {
                        for e in errors {
                            warn!(error = %e, "Watcher error");
                        }
                    }
                },
            )
            .map_err(|e| IndexerError::Watcher(e.to_string()))?;
            self.debouncer = Some(debouncer);
        }
        self.debouncer
            .as_mut()
            .ok_or_else(|| IndexerError::Watcher("debouncer unavailable".to_string()))
    }

    /// Start watching a directory.
    pub fn watch(&mut self, path: &Path) -> Result<(), IndexerError> {
        if !path.is_dir() {
            return Err(IndexerError::NotFound(path.to_path_buf()));
        }
        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.debouncer()?
            .watch(path, mode)
            .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;

        info!(path = ?path, recursive = self.options.recursive, "Started watching");
        Ok(())
    }

    /// Stop watching a directory.
    pub fn unwatch(&mut self, path: &Path) -> Result<(), IndexerError> {
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer
                .unwatch(path)
                .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;
            info!(path = ?path, "Stopped watching");
        }
        Ok(())
    }
}

fn path_string(path: &Path) -> Option<String> {
    match path.to_str() {
        Some(s) => Some(s.to_string()),
        None => {
            debug!(path = ?path, "Ignoring non UTF-8 path");
            None
        }
    }
}

/// Translate a notify event into queue events.
pub(crate) fn convert_event(event: &Event) -> Vec<FileEvent> {
    let paths: Vec<String> = event
        .paths
        .iter()
        .filter(|p| !p.is_dir())
        .filter_map(|p| path_string(p))
        .collect();
    let Some(first) = paths.first().cloned() else {
        return Vec::new();
    };

    let events = match &event.kind {
        EventKind::Create(_) => vec![FileEvent::Created(first)],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = vec![FileEvent::Deleted(first)];
            if let Some(to) = paths.get(1) {
                events.push(FileEvent::Created(to.clone()));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![FileEvent::Deleted(first)],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![FileEvent::Created(first)],
        EventKind::Modify(_) => vec![FileEvent::Updated(first)],
        EventKind::Remove(_) => vec![FileEvent::Deleted(first)],
        EventKind::Any | EventKind::Access(_) | EventKind::Other => Vec::new(),
    };

    for change in &events {
        debug!(event = ?change, "File change detected");
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(|p| PathBuf::from(*p)).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_watcher_options_default() {
        let options = WatcherOptions::default();
        assert_eq!(options.debounce_duration, Duration::from_millis(500));
        assert!(options.recursive);
    }

    #[test]
    fn test_watch_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let mut watcher = FileWatcher::new(WatcherOptions::default(), Arc::new(EventQueue::new()));
        let err = watcher.watch(&temp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, IndexerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_watcher_create() {
        let temp_dir = tempdir().unwrap();
        let mut watcher = FileWatcher::new(WatcherOptions::default(), Arc::new(EventQueue::new()));
        assert!(watcher.watch(temp_dir.path()).is_ok());
        assert!(watcher.unwatch(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_convert_event_create() {
        let events = convert_event(&event(
            EventKind::Create(notify::event::CreateKind::File),
            &["/nonexistent/test.rs"],
        ));
        assert_eq!(events, [FileEvent::Created("/nonexistent/test.rs".into())]);
    }

    #[test]
    fn test_convert_event_modify() {
        let events = convert_event(&event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            &["/nonexistent/test.rs"],
        ));
        assert_eq!(events, [FileEvent::Updated("/nonexistent/test.rs".into())]);
    }

    #[test]
    fn test_convert_event_delete() {
        let events = convert_event(&event(
            EventKind::Remove(notify::event::RemoveKind::File),
            &["/nonexistent/test.rs"],
        ));
        assert_eq!(events, [FileEvent::Deleted("/nonexistent/test.rs".into())]);
    }

    #[test]
    fn test_convert_event_rename() {
        let events = convert_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/nonexistent/old.txt", "/nonexistent/new.txt"],
        ));
        assert_eq!(
            events,
            [
                FileEvent::Deleted("/nonexistent/old.txt".into()),
                FileEvent::Created("/nonexistent/new.txt".into()),
            ]
        );
    }

    #[test]
    fn test_convert_event_access_ignored() {
        let events = convert_event(&event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/nonexistent/test.rs"],
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn test_convert_event_directory_ignored() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().to_str().unwrap();
        let events = convert_event(&event(
            EventKind::Create(notify::event::CreateKind::Folder),
            &[dir],
        ));
        assert!(events.is_empty());
    }
}
