//! Structured diagnostics for loader decisions.
//!
//! Events go through `tracing`; installing a subscriber is the host's job.
//! Failures are always reported. In non-verbose mode they carry only the
//! unit path and error kind; verbose mode adds resolution decisions, cache
//! hits, execution progress and full error chains.

use crate::error::LoadError;
use crate::source::Resolution;
use crate::store::{BeginLoad, DependencyReference};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    pub fn new(verbose: bool) -> Self { Self { verbose } }

    pub fn resolved(&self, reference: &DependencyReference, requested_by: Option<&Path>, resolution: &Resolution) {
        if self.verbose {
            info!(
                reference = %reference,
                requested_by = ?requested_by,
                resolved = %resolution.path.display(),
                candidates = resolution.tried.len(),
                "resolved dependency"
            );
        }
    }

    pub fn cache_hit(&self, path: &Path) {
        if self.verbose {
            debug!(path = %path.display(), "already loaded");
        }
    }

    pub fn begin(&self, path: &Path, outcome: &BeginLoad, attempts: u32) {
        if !self.verbose {
            return;
        }
        match outcome {
            BeginLoad::Ok => info!(path = %path.display(), attempt = attempts, "loading"),
            BeginLoad::Cyclic(cycle) => debug!(path = %path.display(), depth = cycle.len(), "cycle guard tripped"),
            BeginLoad::AttemptLimitExceeded { attempts } => {
                debug!(path = %path.display(), attempts, "attempt budget spent")
            }
        }
    }

    pub fn dependencies(&self, path: &Path, declared: &[DependencyReference]) {
        if self.verbose && !declared.is_empty() {
            let list: Vec<&str> = declared.iter().map(|d| d.as_str()).collect();
            debug!(path = %path.display(), dependencies = ?list, "declared dependencies");
        }
    }

    pub fn executing(&self, path: &Path) {
        if self.verbose {
            debug!(path = %path.display(), "executing");
        }
    }

    pub fn loaded(&self, path: &Path) {
        if self.verbose {
            info!(path = %path.display(), "loaded");
        }
    }

    /// `path` is `None` when an entry reference never resolved to a file.
    pub fn failed(&self, path: Option<&Path>, err: &LoadError) {
        let shown = path.map(|p| p.display().to_string()).unwrap_or_else(|| "<unresolved>".to_string());
        if self.verbose {
            warn!(
                path = %shown,
                kind = %err.kind(),
                error = %err,
                root_cause = %err.root_cause(),
                "load failed"
            );
            if let LoadError::UnresolvedDependency { tried, .. } = err.root_cause() {
                for candidate in tried {
                    debug!(candidate = %candidate.display(), "tried");
                }
            }
        } else {
            warn!(path = %shown, kind = %err.kind(), "load failed");
        }
    }

    pub fn directory_summary(&self, root: &Path, loaded: usize, failed: usize) {
        if failed > 0 {
            warn!(root = %root.display(), loaded, failed, "directory loaded with failures");
        } else if self.verbose {
            info!(root = %root.display(), loaded, "directory loaded");
        }
    }
}
