//! Depth-first listing of the files below an indexed directory.

use crate::filter::FilterManager;
use crate::IndexerError;
use ignore::WalkBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// A regular file reported by a lister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListedFile<'a> {
    /// Full path
    pub path: &'a str,
    /// Length of the directory part of `path`, including the separator
    pub dir_len: usize,
    /// Modification time (Unix seconds)
    pub mtime: i64,
}

impl ListedFile<'_> {
    pub fn file_name(&self) -> &str {
        &self.path[self.dir_len..]
    }
}

/// Source of the files under a root directory.
pub trait FileLister: Send {
    /// Call `visit` for every regular file below `root`.
    ///
    /// `visit` returns `true` to keep listing; skipping a file is done by
    /// returning `true` without recording it. Returning `false` ends the
    /// listing early. Returns `Ok(false)` when the listing was ended that
    /// way, `Ok(true)` when it ran to completion.
    fn list_files(
        &mut self,
        root: &str,
        visit: &mut dyn FnMut(&ListedFile<'_>) -> bool,
    ) -> Result<bool, IndexerError>;
}

/// Lister backed by `ignore::WalkBuilder`.
///
/// Directories excluded by the filter are pruned without being entered.
pub struct WalkLister {
    filter: Arc<FilterManager>,
    respect_gitignore: bool,
    follow_links: bool,
}

impl WalkLister {
    pub fn new(filter: Arc<FilterManager>, respect_gitignore: bool) -> Self {
        Self {
            filter,
            respect_gitignore,
            follow_links: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

fn mtime_of(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl FileLister for WalkLister {
    fn list_files(
        &mut self,
        root: &str,
        visit: &mut dyn FnMut(&ListedFile<'_>) -> bool,
    ) -> Result<bool, IndexerError> {
        let root_path = PathBuf::from(root);
        if !root_path.is_dir() {
            return Err(IndexerError::NotFound(root_path));
        }

        let filter = Arc::clone(&self.filter);
        let prune_root = root_path.clone();
        let walker = WalkBuilder::new(&root_path)
            .standard_filters(false)
            .git_ignore(self.respect_gitignore)
            .require_git(false)
            .follow_links(self.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                match entry.path().strip_prefix(&prune_root) {
                    Ok(relative) if is_dir => !filter.is_excluded_relative(relative, true),
                    _ => true,
                }
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Walk error");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(path) = entry.path().to_str() else {
                debug!(path = ?entry.path(), "Skipping non UTF-8 path");
                continue;
            };
            let mtime = match entry.metadata() {
                Ok(metadata) => mtime_of(&metadata),
                Err(e) => {
                    debug!(path, error = %e, "Cannot stat file");
                    continue;
                }
            };
            let dir_len = path.rfind('/').map_or(0, |i| i + 1);
            let file = ListedFile {
                path,
                dir_len,
                mtime,
            };
            if !visit(&file) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
