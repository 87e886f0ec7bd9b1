use crate::error::{ErrorKind, LoadError};
use crate::source::WalkWarning;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one `Loader::load` call.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Canonical path of the unit; `None` if the reference never resolved.
    pub path: Option<PathBuf>,
    pub success: bool,
    /// True when the unit was already `Loaded` and nothing ran.
    pub cached: bool,
    /// Resolved dependency paths, in declaration order.
    pub dependencies: Vec<PathBuf>,
    pub error: Option<LoadError>,
}

impl LoadResult {
    pub(crate) fn loaded(path: PathBuf, dependencies: Vec<PathBuf>) -> Self {
        Self { path: Some(path), success: true, cached: false, dependencies, error: None }
    }

    pub(crate) fn cached(path: PathBuf, dependencies: Vec<PathBuf>) -> Self {
        Self { path: Some(path), success: true, cached: true, dependencies, error: None }
    }

    pub(crate) fn failed(path: Option<PathBuf>, dependencies: Vec<PathBuf>, error: LoadError) -> Self {
        Self { path, success: false, cached: false, dependencies, error: Some(error) }
    }

    pub fn is_success(&self) -> bool { self.success }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(LoadError::kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUnit {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of `Loader::load_directory`. The caller decides whether any
/// failure is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub root: PathBuf,
    /// Canonical paths, in the order they were requested.
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<FailedUnit>,
    pub warnings: Vec<WalkWarning>,
}

impl DirectoryReport {
    pub fn is_clean(&self) -> bool { self.failed.is_empty() }

    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed.iter().map(|f| f.path.clone()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
