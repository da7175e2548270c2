//! Exclusion rules applied to paths below the indexed directories.
//!
//! A path is excluded when any component below its root starts with a dot,
//! or when it matches one of the configured gitignore-style patterns.
//! Patterns are matched against the path relative to its root.

use std::collections::BTreeSet;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::IndexerError;

/// Whether `path` is `root` or lies below it.
pub fn is_within(path: &str, root: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Compiled exclusion patterns.
#[derive(Debug, Clone)]
pub struct FilterManager {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl FilterManager {
    /// Compile `patterns`; an invalid pattern is an error.
    pub fn new(patterns: &[String]) -> Result<Self, IndexerError> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| IndexerError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }
        let matcher = builder.build().map_err(|e| IndexerError::Pattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;
        Ok(Self {
            patterns: patterns.to_vec(),
            matcher,
        })
    }

    /// Filter that only skips hidden entries.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `relative` (a path below some root) is excluded.
    pub fn is_excluded_relative(&self, relative: &Path, is_dir: bool) -> bool {
        if relative.as_os_str().is_empty() {
            return false;
        }
        let hidden = relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        if hidden {
            return true;
        }
        !self.patterns.is_empty()
            && self
                .matcher
                .matched_path_or_any_parents(relative, is_dir)
                .is_ignore()
    }

    /// Whether the file `path` below `root` is excluded.
    pub fn is_excluded(&self, root: &str, path: &str) -> bool {
        if !is_within(path, root) {
            return true;
        }
        let relative = path[root.len()..].trim_start_matches('/');
        let excluded = self.is_excluded_relative(Path::new(relative), false);
        if excluded {
            debug!(path, "Excluded by filter");
        }
        excluded
    }

    /// Whether `path` lies in one of `roots` and is not excluded there.
    pub fn accepts(&self, roots: &BTreeSet<String>, path: &str) -> bool {
        roots
            .iter()
            .find(|root| is_within(path, root))
            .is_some_and(|root| !self.is_excluded(root, path))
    }
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/etc", "/"));
    }

    #[test]
    fn test_hidden_components() {
        let filter = FilterManager::empty();
        assert!(filter.is_excluded("/home/u", "/home/u/.cache/x"));
        assert!(filter.is_excluded("/home/u", "/home/u/docs/.secret"));
        // Hidden components above the root do not count.
        assert!(!filter.is_excluded("/home/.u", "/home/.u/docs/a.txt"));
    }

    #[test]
    fn test_patterns() {
        let filter = FilterManager::new(&["*.o".to_string(), "build/".to_string()]).unwrap();
        assert!(filter.is_excluded("/src", "/src/main.o"));
        assert!(filter.is_excluded("/src", "/src/build/out.txt"));
        assert!(!filter.is_excluded("/src", "/src/main.c"));
        assert!(!filter.is_excluded("/src", "/src/rebuild.txt"));
    }

    #[test]
    fn test_accepts_needs_root() {
        let filter = FilterManager::empty();
        let roots: BTreeSet<String> = ["/a".to_string()].into();
        assert!(filter.accepts(&roots, "/a/x.txt"));
        assert!(!filter.accepts(&roots, "/b/x.txt"));
    }
}
