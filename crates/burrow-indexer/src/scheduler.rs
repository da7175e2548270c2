//! Incremental index scheduler.
//!
//! The scheduler reconciles the indexed directories against the files the
//! store already holds, then keeps the store current from the event queue.
//! All analysis happens on one worker; [`SchedulerHandle`] lets other tasks
//! request passes, stop them, and reconfigure the directory set.
//!
//! States move `Idling -> Working -> Idling` until `Stopping`, which is
//! terminal. Work is checked against the state between units, so a stop
//! never interrupts a unit while it is being written.

use crate::filter::{is_within, FilterManager};
use crate::lister::{FileLister, ListedFile};
use crate::queue::{EventQueue, FileEvent};
use crate::stats::IndexStats;
use burrow_analyzer::{IndexManager, StreamAnalyzer};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idling = 0,
    Working = 1,
    Stopping = 2,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SchedulerState::Idling,
            1 => SchedulerState::Working,
            _ => SchedulerState::Stopping,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idling => "idling",
            SchedulerState::Working => "indexing",
            SchedulerState::Stopping => "stopping",
        }
    }
}

/// Options for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Cached units that force a commit mid-pass
    pub commit_threshold: usize,
    /// Interval between ticks in [`IndexScheduler::run`]
    pub poll_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            commit_threshold: 10_000,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Collapse `dirs` so that no directory lies below another, stripping
/// trailing separators.
pub fn normalize_directories<I, S>(dirs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cleaned: Vec<String> = dirs
        .into_iter()
        .filter_map(|dir| {
            let dir = dir.as_ref();
            let trimmed = dir.trim_end_matches('/');
            if !trimmed.is_empty() {
                Some(trimmed.to_string())
            } else if dir.starts_with('/') {
                Some("/".to_string())
            } else {
                None
            }
        })
        .collect();
    // Ancestors sort before their descendants.
    cleaned.sort();
    cleaned.dedup();

    let mut roots = BTreeSet::new();
    for dir in cleaned {
        if !roots.iter().any(|root: &String| is_within(&dir, root)) {
            roots.insert(dir);
        }
    }
    roots
}

struct Shared {
    state: AtomicU8,
    dirs: RwLock<BTreeSet<String>>,
    queue: Arc<EventQueue>,
    stats: IndexStats,
    pending: AtomicUsize,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_working(&self) -> bool {
        self.state() == SchedulerState::Working
    }

    fn transition(&self, from: SchedulerState, to: SchedulerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Cloneable control surface of a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Request a full pass. Returns false unless the scheduler was idle.
    pub fn start_indexing(&self) -> bool {
        let started = self
            .shared
            .transition(SchedulerState::Idling, SchedulerState::Working);
        if started {
            info!("Indexing requested");
        }
        started
    }

    /// Interrupt the current pass at the next unit boundary.
    pub fn stop_indexing(&self) -> bool {
        let stopped = self
            .shared
            .transition(SchedulerState::Working, SchedulerState::Idling);
        if stopped {
            info!("Indexing stop requested");
        }
        stopped
    }

    /// Stop for good; [`IndexScheduler::run`] returns after the current tick.
    pub fn shutdown(&self) {
        self.shared
            .state
            .store(SchedulerState::Stopping as u8, Ordering::SeqCst);
        info!("Scheduler shutting down");
    }

    pub fn indexed_directories(&self) -> BTreeSet<String> {
        self.shared.dirs.read().clone()
    }

    /// Replace the indexed directories with the normalized form of `dirs`.
    pub fn set_indexed_directories<I, S>(&self, dirs: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots = normalize_directories(dirs);
        info!(directories = ?roots, "Indexed directories set");
        *self.shared.dirs.write() = roots.clone();
        roots
    }

    /// Queue shared with the change notification source.
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.shared.queue
    }

    pub fn stats(&self) -> &IndexStats {
        &self.shared.stats
    }

    /// Files waiting to be indexed in the current pass.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }
}

struct Worker {
    analyzer: StreamAnalyzer,
    index: Arc<dyn IndexManager>,
    lister: Box<dyn FileLister>,
    filter: Arc<FilterManager>,
    shared: Arc<Shared>,
    commit_threshold: usize,
    dbfiles: BTreeMap<String, i64>,
    to_index: BTreeMap<String, i64>,
}

impl Worker {
    fn tick(&mut self) {
        match self.shared.state() {
            SchedulerState::Working => {
                self.index();
                self.shared
                    .transition(SchedulerState::Working, SchedulerState::Idling);
            }
            SchedulerState::Idling => {
                if !self.shared.queue.is_empty()
                    && self
                        .shared
                        .transition(SchedulerState::Idling, SchedulerState::Working)
                {
                    let events = self.shared.queue.drain();
                    self.process_events(events);
                    self.shared
                        .transition(SchedulerState::Working, SchedulerState::Idling);
                }
            }
            SchedulerState::Stopping => {}
        }
    }

    /// Full pass: reconcile if nothing is pending, then apply the result.
    fn index(&mut self) {
        if self.dbfiles.is_empty() && self.to_index.is_empty() {
            match self.index.reader().get_files(0) {
                Ok(files) => self.dbfiles = files,
                Err(e) => {
                    warn!(error = %e, "Cannot read indexed files");
                    return;
                }
            }
            debug!(stored = self.dbfiles.len(), "Reconciling indexed directories");
            if !self.reconcile() {
                info!("Reconciliation interrupted");
                self.dbfiles.clear();
                self.to_index.clear();
                self.update_pending();
                return;
            }
            info!(
                to_remove = self.dbfiles.len(),
                to_index = self.to_index.len(),
                "Reconciliation finished"
            );
        }

        if self.shared.is_working() && !self.dbfiles.is_empty() {
            let removed: Vec<String> = std::mem::take(&mut self.dbfiles).into_keys().collect();
            match self.index.writer().delete_entries(&removed) {
                Ok(()) => self.shared.stats.record_deleted(removed.len()),
                Err(e) => warn!(error = %e, count = removed.len(), "Cannot delete entries"),
            }
        }

        while self.shared.is_working() {
            let Some((path, _)) = self.to_index.pop_first() else {
                break;
            };
            self.update_pending();
            self.index_file(&path);
            self.commit_if_full();
        }

        let complete = self.dbfiles.is_empty() && self.to_index.is_empty();
        self.commit();
        if complete && self.shared.is_working() {
            if let Err(e) = self.index.writer().optimize() {
                warn!(error = %e, "Optimize failed");
            }
            info!("Indexing pass complete");
        }
    }

    /// Walk every root, filling `to_index` and leaving unseen files in
    /// `dbfiles`. Returns false when the walk was interrupted.
    fn reconcile(&mut self) -> bool {
        let roots: Vec<String> = self.shared.dirs.read().iter().cloned().collect();
        let Worker {
            lister,
            filter,
            shared,
            dbfiles,
            to_index,
            ..
        } = self;

        for root in &roots {
            let mut visit = |file: &ListedFile<'_>| -> bool {
                if !shared.is_working() {
                    return false;
                }
                if filter.is_excluded(root, file.path) {
                    return true;
                }
                match dbfiles.remove(file.path) {
                    Some(mtime) if mtime == file.mtime => {}
                    _ => {
                        to_index.insert(file.path.to_string(), file.mtime);
                    }
                }
                true
            };
            match lister.list_files(root, &mut visit) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => warn!(root = %root, error = %e, "Cannot list directory"),
            }
        }
        self.update_pending();
        self.shared.is_working()
    }

    /// Apply queued change events.
    fn process_events(&mut self, events: Vec<FileEvent>) {
        let roots = self.shared.dirs.read().clone();
        let total = events.len();
        let mut deletions = Vec::new();
        let mut additions = Vec::new();
        for event in events {
            if !self.filter.accepts(&roots, event.path()) {
                continue;
            }
            match event {
                FileEvent::Created(_) => additions.push(event),
                FileEvent::Updated(ref path) => {
                    deletions.push(path.clone());
                    additions.push(event);
                }
                FileEvent::Deleted(path) => deletions.push(path),
            }
        }
        debug!(
            events = total,
            deletions = deletions.len(),
            additions = additions.len(),
            "Processing change events"
        );

        if !deletions.is_empty() {
            match self.index.writer().delete_entries(&deletions) {
                Ok(()) => self.shared.stats.record_deleted(deletions.len()),
                Err(e) => warn!(error = %e, count = deletions.len(), "Cannot delete entries"),
            }
        }

        let mut done = 0;
        while done < additions.len() && self.shared.is_working() {
            self.index_file(additions[done].path());
            done += 1;
            self.commit_if_full();
        }
        if done < additions.len() {
            let rest = additions.split_off(done);
            info!(requeued = rest.len(), "Event pass interrupted");
            self.shared.queue.push_front_all(rest);
        }
        self.shared.stats.record_events(total);

        let complete = self.shared.is_working();
        self.commit();
        if complete {
            if let Err(e) = self.index.writer().optimize() {
                warn!(error = %e, "Optimize failed");
            }
        }
    }

    /// Drop the file's old entries and analyze it again.
    fn index_file(&mut self, path: &str) {
        let writer = self.index.writer();
        if let Err(e) = writer.delete_entries(&[path.to_string()]) {
            warn!(path, error = %e, "Cannot delete old entries");
        }
        match self.analyzer.analyze_file(Path::new(path), writer) {
            Ok(()) => self.shared.stats.record_indexed(),
            Err(e) => {
                debug!(path, error = %e, code = e.code(), "File not fully analyzed");
                self.shared.stats.record_failed();
            }
        }
    }

    fn commit_if_full(&self) {
        if self.index.writer().items_in_cache() > self.commit_threshold {
            self.commit();
        }
    }

    fn commit(&self) {
        match self.index.writer().commit() {
            Ok(()) => self.shared.stats.record_commit(),
            Err(e) => warn!(error = %e, "Commit failed"),
        }
    }

    fn update_pending(&self) {
        self.shared
            .pending
            .store(self.to_index.len(), Ordering::Relaxed);
    }
}

/// Drives a single indexing worker.
pub struct IndexScheduler {
    shared: Arc<Shared>,
    worker: Arc<Mutex<Worker>>,
    poll_interval: Duration,
}

impl IndexScheduler {
    pub fn new(
        analyzer: StreamAnalyzer,
        index: Arc<dyn IndexManager>,
        lister: Box<dyn FileLister>,
        filter: Arc<FilterManager>,
        options: SchedulerOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SchedulerState::Idling as u8),
            dirs: RwLock::new(BTreeSet::new()),
            queue: Arc::new(EventQueue::new()),
            stats: IndexStats::default(),
            pending: AtomicUsize::new(0),
        });
        let worker = Worker {
            analyzer,
            index,
            lister,
            filter,
            shared: Arc::clone(&shared),
            commit_threshold: options.commit_threshold,
            dbfiles: BTreeMap::new(),
            to_index: BTreeMap::new(),
        };
        Self {
            shared,
            worker: Arc::new(Mutex::new(worker)),
            poll_interval: options.poll_interval,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run one unit of scheduling on the calling thread.
    pub fn tick(&self) {
        self.worker.lock().tick();
    }

    /// Tick on an interval until shut down. Each tick runs on the blocking
    /// pool.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Scheduler started");

        loop {
            interval.tick().await;
            if self.shared.state() == SchedulerState::Stopping {
                break;
            }
            let worker = Arc::clone(&self.worker);
            if let Err(e) = tokio::task::spawn_blocking(move || worker.lock().tick()).await {
                error!(error = %e, "Scheduler tick failed");
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_analyzer::{
        AnalyzerConfig, AnalyzerRegistry, FieldValue, IndexError, IndexReader, IndexWriter,
        IndexedDocument, Query, UnitId,
    };
    use std::sync::atomic::AtomicU64;
    use tempfile::tempdir;

    /// Store double recording every call.
    #[derive(Default)]
    struct MockIndex {
        stored: BTreeMap<String, i64>,
        next: AtomicU64,
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<String>>,
        open: Mutex<BTreeMap<u64, String>>,
        deleted: Mutex<Vec<String>>,
        cache: AtomicUsize,
        commits: AtomicUsize,
        optimizes: AtomicUsize,
        stop_after: Option<usize>,
        handle: Mutex<Option<SchedulerHandle>>,
    }

    impl IndexWriter for MockIndex {
        fn start_unit(&self, path: &str, _mtime: i64, _depth: u32) -> Option<UnitId> {
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            self.started.lock().push(path.to_string());
            self.open.lock().insert(id, path.to_string());
            Some(UnitId(id))
        }

        fn add_field(&self, _unit: UnitId, _name: &str, _value: &FieldValue) {}

        fn add_text(&self, _unit: UnitId, _text: &str) {}

        fn finish_unit(&self, unit: UnitId) {
            if let Some(path) = self.open.lock().remove(&unit.0) {
                let mut finished = self.finished.lock();
                finished.push(path);
                self.cache.fetch_add(1, Ordering::SeqCst);
                if Some(finished.len()) == self.stop_after {
                    if let Some(handle) = self.handle.lock().as_ref() {
                        handle.stop_indexing();
                    }
                }
            }
        }

        fn delete_entries(&self, paths: &[String]) -> Result<(), IndexError> {
            self.deleted.lock().extend(paths.iter().cloned());
            Ok(())
        }

        fn commit(&self) -> Result<(), IndexError> {
            self.cache.store(0, Ordering::SeqCst);
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn items_in_cache(&self) -> usize {
            self.cache.load(Ordering::SeqCst)
        }

        fn optimize(&self) -> Result<(), IndexError> {
            self.optimizes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl IndexReader for MockIndex {
        fn get_files(&self, _depth: u32) -> Result<BTreeMap<String, i64>, IndexError> {
            Ok(self.stored.clone())
        }

        fn count_hits(&self, _query: &Query) -> usize {
            0
        }

        fn query(&self, _query: &Query, _max: usize, _offset: usize) -> Vec<IndexedDocument> {
            Vec::new()
        }

        fn count_documents(&self) -> usize {
            self.stored.len()
        }
    }

    impl IndexManager for MockIndex {
        fn writer(&self) -> &dyn IndexWriter {
            self
        }

        fn reader(&self) -> &dyn IndexReader {
            self
        }
    }

    /// Lister over a fixed file table.
    struct FixedLister {
        files: Vec<(String, i64)>,
        stop_at: Option<(usize, Arc<Mutex<Option<SchedulerHandle>>>)>,
    }

    impl FileLister for FixedLister {
        fn list_files(
            &mut self,
            root: &str,
            visit: &mut dyn FnMut(&ListedFile<'_>) -> bool,
        ) -> Result<bool, crate::IndexerError> {
            for (i, (path, mtime)) in self.files.iter().enumerate() {
                if !is_within(path, root) {
                    continue;
                }
                if let Some((at, handle)) = &self.stop_at {
                    if *at == i {
                        if let Some(handle) = handle.lock().as_ref() {
                            handle.stop_indexing();
                        }
                    }
                }
                let file = ListedFile {
                    path,
                    dir_len: path.rfind('/').map_or(0, |p| p + 1),
                    mtime: *mtime,
                };
                if !visit(&file) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }

    fn text_analyzer() -> StreamAnalyzer {
        let mut registry = AnalyzerRegistry::new(AnalyzerConfig::default());
        registry.register_end(Box::new(burrow_analyzer::analyzers::text::TextEndFactory));
        StreamAnalyzer::new(registry)
    }

    fn scheduler(index: Arc<MockIndex>, lister: FixedLister, threshold: usize) -> IndexScheduler {
        let scheduler = IndexScheduler::new(
            text_analyzer(),
            index.clone(),
            Box::new(lister),
            Arc::new(FilterManager::new(&["*.o".to_string()]).unwrap()),
            SchedulerOptions {
                commit_threshold: threshold,
                ..Default::default()
            },
        );
        *index.handle.lock() = Some(scheduler.handle());
        scheduler
    }

    fn write_files(root: &Path, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                let path = root.join(name);
                std::fs::write(&path, format!("contents of {}\n", name)).unwrap();
                path.to_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_normalize_directories() {
        let roots = normalize_directories(["/a", "/a/b", "/c/"]);
        assert_eq!(roots, BTreeSet::from(["/a".to_string(), "/c".to_string()]));

        let roots = normalize_directories(["/a/b", "/ab", "/a", "relative/", ""]);
        assert_eq!(
            roots.into_iter().collect::<Vec<_>>(),
            ["/a", "/ab", "relative"]
        );
        assert_eq!(
            normalize_directories(["/", "/x"]).into_iter().collect::<Vec<_>>(),
            ["/"]
        );
    }

    #[test]
    fn test_state_transitions() {
        let index = Arc::new(MockIndex::default());
        let lister = FixedLister {
            files: Vec::new(),
            stop_at: None,
        };
        let scheduler = scheduler(index, lister, 10_000);
        let handle = scheduler.handle();

        assert_eq!(handle.state(), SchedulerState::Idling);
        assert!(!handle.stop_indexing());
        assert!(handle.start_indexing());
        assert!(!handle.start_indexing());
        assert_eq!(handle.state().as_str(), "indexing");

        scheduler.tick();
        assert_eq!(handle.state(), SchedulerState::Idling);

        handle.shutdown();
        assert!(!handle.start_indexing());
        assert_eq!(handle.state().as_str(), "stopping");
    }

    #[test]
    fn test_reconciliation_converges() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let paths = write_files(temp_dir.path(), &["a", "c"]);
        let b = format!("{}/b", root);

        let index = Arc::new(MockIndex {
            stored: BTreeMap::from([(paths[0].clone(), 100), (b.clone(), 100)]),
            ..Default::default()
        });
        let lister = FixedLister {
            files: vec![
                (paths[0].clone(), 100),
                (format!("{}/skip.o", root), 1),
                (format!("{}/.hidden/x", root), 1),
                (paths[1].clone(), 200),
            ],
            stop_at: None,
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        let handle = scheduler.handle();
        handle.set_indexed_directories([format!("{}/", root)]);

        assert!(handle.start_indexing());
        scheduler.tick();

        assert!(index.deleted.lock().contains(&b));
        assert!(!index.deleted.lock().contains(&paths[0]));
        assert_eq!(*index.started.lock(), [paths[1].clone()]);
        assert_eq!(index.commits.load(Ordering::SeqCst), 1);
        assert_eq!(index.optimizes.load(Ordering::SeqCst), 1);

        let worker = scheduler.worker.lock();
        assert!(worker.dbfiles.is_empty());
        assert!(worker.to_index.is_empty());
        assert_eq!(handle.stats().snapshot().units_indexed, 1);
        assert_eq!(handle.state(), SchedulerState::Idling);
    }

    #[test]
    fn test_interrupted_walk_clears_maps() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let handle_slot = Arc::new(Mutex::new(None));
        let index = Arc::new(MockIndex {
            stored: BTreeMap::from([(format!("{}/gone", root), 1)]),
            ..Default::default()
        });
        let lister = FixedLister {
            files: (0..5).map(|i| (format!("{}/f{}", root, i), 1)).collect(),
            stop_at: Some((2, handle_slot.clone())),
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        *handle_slot.lock() = Some(scheduler.handle());
        scheduler.handle().set_indexed_directories([root.as_str()]);

        scheduler.handle().start_indexing();
        scheduler.tick();

        // Nothing unvisited may be deleted.
        assert!(index.deleted.lock().is_empty());
        assert!(index.started.lock().is_empty());
        let worker = scheduler.worker.lock();
        assert!(worker.dbfiles.is_empty());
        assert!(worker.to_index.is_empty());
    }

    #[test]
    fn test_stop_between_units() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let names: Vec<String> = (0..6).map(|i| format!("f{}", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = write_files(temp_dir.path(), &name_refs);

        let index = Arc::new(MockIndex {
            stop_after: Some(2),
            ..Default::default()
        });
        let lister = FixedLister {
            files: paths.iter().map(|p| (p.clone(), 1)).collect(),
            stop_at: None,
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        let handle = scheduler.handle();
        handle.set_indexed_directories([root.as_str()]);

        handle.start_indexing();
        scheduler.tick();

        assert_eq!(*index.started.lock(), *index.finished.lock());
        assert_eq!(index.finished.lock().len(), 2);
        assert_eq!(index.commits.load(Ordering::SeqCst), 1);
        assert_eq!(index.optimizes.load(Ordering::SeqCst), 0);
        assert_eq!(handle.pending(), 4);
        assert_eq!(scheduler.worker.lock().to_index.len(), 4);

        // The next pass resumes the remaining files without walking again.
        handle.start_indexing();
        scheduler.tick();
        assert_eq!(index.finished.lock().len(), 6);
        assert_eq!(index.optimizes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_pass_commits_in_batches() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let paths = write_files(temp_dir.path(), &["x", "y", "z"]);

        let index = Arc::new(MockIndex::default());
        let lister = FixedLister {
            files: Vec::new(),
            stop_at: None,
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        let handle = scheduler.handle();
        handle.set_indexed_directories([root.as_str()]);
        for i in 0..15_000 {
            handle
                .queue()
                .push(FileEvent::Created(paths[i % paths.len()].clone()));
        }

        scheduler.tick();

        assert!(index.commits.load(Ordering::SeqCst) >= 2);
        assert_eq!(index.finished.lock().len(), 15_000);
        assert!(handle.queue().is_empty());
        assert_eq!(handle.stats().snapshot().events_processed, 15_000);
        assert_eq!(handle.state(), SchedulerState::Idling);
    }

    #[test]
    fn test_events_apply_and_filter() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let paths = write_files(temp_dir.path(), &["new.txt", "changed.txt"]);

        let index = Arc::new(MockIndex::default());
        let lister = FixedLister {
            files: Vec::new(),
            stop_at: None,
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        let handle = scheduler.handle();
        handle.set_indexed_directories([root.as_str()]);

        let queue = handle.queue();
        queue.push(FileEvent::Created(paths[0].clone()));
        queue.push(FileEvent::Updated(paths[1].clone()));
        queue.push(FileEvent::Deleted(format!("{}/old.txt", root)));
        queue.push(FileEvent::Created(format!("{}/obj.o", root)));
        queue.push(FileEvent::Created("/elsewhere/file.txt".to_string()));

        scheduler.tick();

        assert_eq!(*index.finished.lock(), [paths[0].clone(), paths[1].clone()]);
        let deleted = index.deleted.lock();
        assert!(deleted.contains(&format!("{}/old.txt", root)));
        assert!(deleted.contains(&paths[1]));
        assert!(!deleted.iter().any(|p| p.ends_with(".o")));
        assert_eq!(index.commits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stopped_event_pass_requeues() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let paths = write_files(temp_dir.path(), &["a", "b", "c", "d"]);

        let index = Arc::new(MockIndex {
            stop_after: Some(1),
            ..Default::default()
        });
        let lister = FixedLister {
            files: Vec::new(),
            stop_at: None,
        };
        let scheduler = scheduler(index.clone(), lister, 10_000);
        let handle = scheduler.handle();
        handle.set_indexed_directories([root.as_str()]);
        for path in &paths {
            handle.queue().push(FileEvent::Created(path.clone()));
        }

        scheduler.tick();

        assert_eq!(index.finished.lock().len(), 1);
        let requeued: Vec<String> = handle
            .queue()
            .drain()
            .into_iter()
            .map(|e| e.path().to_string())
            .collect();
        assert_eq!(requeued, paths[1..]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let index = Arc::new(MockIndex::default());
        let lister = FixedLister {
            files: Vec::new(),
            stop_at: None,
        };
        let scheduler = Arc::new(IndexScheduler::new(
            text_analyzer(),
            index,
            Box::new(lister),
            Arc::new(FilterManager::empty()),
            SchedulerOptions {
                poll_interval: Duration::from_millis(5),
                ..Default::default()
            },
        ));
        let handle = scheduler.handle();
        let task = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };
        handle.start_indexing();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), SchedulerState::Stopping);
    }
}
