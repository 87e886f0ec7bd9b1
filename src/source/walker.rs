//! Recursive discovery of candidate units under a root directory.

use super::matcher::Matcher;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A non-fatal problem met while walking. The offending entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkWarning {
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Matching files, sorted bytewise by full path.
    pub files: Vec<PathBuf>,
    pub warnings: Vec<WalkWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryWalker {
    include: Option<Matcher>,
    exclude: Option<Matcher>,
    max_depth: Option<usize>,
    follow_links: bool,
}

impl DirectoryWalker {
    pub fn new(include: Option<Matcher>, exclude: Option<Matcher>) -> Self {
        Self { include, exclude, max_depth: None, follow_links: true }
    }

    /// Depth 1 means files directly under the root only.
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Enumerates regular files under `root`. Excluded directories are pruned
    /// before descending; the include matcher applies to files only.
    pub fn walk(&self, root: &Path) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();
        let mut walker = WalkDir::new(root).follow_links(self.follow_links).min_depth(1);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !self.exclude.as_ref().is_some_and(|ex| ex.is_match(relative))
        });

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // Symlink loops and unreadable directories land here.
                    let warning = WalkWarning {
                        path: err.path().map(Path::to_path_buf),
                        message: err.to_string(),
                    };
                    tracing::warn!(path = ?warning.path, "{}", warning.message);
                    outcome.warnings.push(warning);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.include.as_ref().map_or(true, |inc| inc.is_match(relative)) {
                outcome.files.push(entry.into_path());
            }
        }

        // Listing order is filesystem dependent; impose a total order.
        outcome.files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        outcome
    }
}
