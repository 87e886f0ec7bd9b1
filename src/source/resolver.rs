//! Maps a dependency reference to a canonical file path.
//!
//! Candidates are tried in a fixed order and the first existing regular file
//! wins:
//! 1. the reference as given (relative references taken against `base_dir`),
//! 2. the requesting directory joined with the reference, for multi-part references,
//! 3. the requesting directory joined with the bare file name,
//! 4. the same with the default extension appended, when missing,
//! 5. each search root in order, bare name then bare name plus extension.
//!
//! Resolution only reads the filesystem; it never touches the registry.

use crate::error::LoadError;
use crate::store::DependencyReference;
use std::fs;
use std::path::{Path, PathBuf};

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// Candidates examined, in order, up to and including the winner.
    pub tried: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
    search_roots: Vec<PathBuf>,
    extension: Option<String>,
}

impl PathResolver {
    pub fn new(base_dir: PathBuf, search_roots: Vec<PathBuf>, extension: Option<&str>) -> Self {
        Self {
            base_dir,
            search_roots,
            extension: extension.map(str::to_string),
        }
    }

    /// Resolves `reference` on behalf of a unit living in `requesting_dir`.
    /// Entry-point requests pass `None` and resolve against `base_dir`.
    pub fn resolve(
        &self,
        reference: &DependencyReference,
        requesting_dir: Option<&Path>,
        requested_by: Option<&Path>,
    ) -> Result<Resolution, LoadError> {
        let candidates = self.candidates(reference, requesting_dir);
        let mut tried = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            tried.push(candidate.clone());
            if candidate.is_file() {
                // A file that vanished between the check and here is treated as missing.
                if let Ok(path) = fs::canonicalize(&candidate) {
                    return Ok(Resolution { path, tried });
                }
            }
        }

        Err(LoadError::UnresolvedDependency {
            reference: reference.as_str().to_string(),
            requested_by: requested_by.map(Path::to_path_buf),
            tried,
        })
    }

    /// The ordered, de-duplicated candidate list.
    pub fn candidates(&self, reference: &DependencyReference, requesting_dir: Option<&Path>) -> Vec<PathBuf> {
        let raw = reference.as_path();
        let local_dir = requesting_dir.unwrap_or(&self.base_dir);
        let mut out: Vec<PathBuf> = Vec::new();
        let mut push = |p: PathBuf| {
            if !out.contains(&p) {
                out.push(p);
            }
        };

        // 1. Exact
        push(self.base_dir.join(raw));

        // 2. Relative to the requester, as written
        if raw.is_relative() && raw.components().count() > 1 {
            push(local_dir.join(raw));
        }

        let Some(bare) = raw.file_name().map(PathBuf::from) else {
            return out;
        };
        let with_ext = self.with_extension(reference, &bare);

        // 3-4. Same directory
        push(local_dir.join(&bare));
        if let Some(ext) = &with_ext {
            push(local_dir.join(ext));
        }

        // 5. Search roots, in declared order. Relative roots hang off base_dir.
        for root in &self.search_roots {
            let root = self.base_dir.join(root);
            push(root.join(&bare));
            if let Some(ext) = &with_ext {
                push(root.join(ext));
            }
        }

        out
    }

    fn with_extension(&self, reference: &DependencyReference, bare: &Path) -> Option<PathBuf> {
        if reference.has_extension() {
            return None;
        }
        let ext = self.extension.as_deref()?;
        let mut name = bare.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        Some(PathBuf::from(name))
    }
}
