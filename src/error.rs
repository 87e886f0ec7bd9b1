//! Defines the error types shared by the loader, the registry and the planner.
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// The error type produced by a host `execute` operation.
pub type ExecuteError = Box<dyn std::error::Error + Send + Sync>;

/// The category of a load failure.
///
/// This is the value callers branch on; the full `LoadError` carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnresolvedDependency,
    CyclicDependency,
    AttemptLimitExceeded,
    ExecutionError,
    /// The file resolved but its text could not be read.
    Unreadable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnresolvedDependency => "UnresolvedDependency",
            ErrorKind::CyclicDependency => "CyclicDependency",
            ErrorKind::AttemptLimitExceeded => "AttemptLimitExceeded",
            ErrorKind::ExecutionError => "ExecutionError",
            ErrorKind::Unreadable => "Unreadable",
        };
        f.write_str(name)
    }
}

/// A failure to load a single unit.
///
/// Foreign errors are held behind `Arc` so a result can be cached in the
/// registry and handed out again on later calls.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("Unresolved dependency '{reference}'{}", requested_by_suffix(.requested_by))]
    UnresolvedDependency {
        reference: String,
        requested_by: Option<PathBuf>,
        tried: Vec<PathBuf>,
    },
    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<PathBuf> },
    #[error("Attempt limit exceeded for '{}' ({attempts}/{max_attempts})", .path.display())]
    AttemptLimitExceeded {
        path: PathBuf,
        attempts: u32,
        max_attempts: u32,
    },
    #[error("Execution of '{}' failed: {source}", .path.display())]
    ExecutionError {
        path: PathBuf,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    #[error("Could not read '{}': {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
    #[error("'{}' not executed: dependency '{}' failed", .path.display(), .dependency.display())]
    DependencyFailed {
        path: PathBuf,
        dependency: PathBuf,
        source: Box<LoadError>,
    },
}

impl LoadError {
    /// The root category of the failure. A unit blocked by a failed dependency
    /// reports the category of whatever broke further down.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::UnresolvedDependency { .. } => ErrorKind::UnresolvedDependency,
            LoadError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            LoadError::AttemptLimitExceeded { .. } => ErrorKind::AttemptLimitExceeded,
            LoadError::ExecutionError { .. } => ErrorKind::ExecutionError,
            LoadError::Unreadable { .. } => ErrorKind::Unreadable,
            LoadError::DependencyFailed { source, .. } => source.kind(),
        }
    }

    /// The innermost error in a `DependencyFailed` chain.
    pub fn root_cause(&self) -> &LoadError {
        match self {
            LoadError::DependencyFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn execution(path: PathBuf, source: ExecuteError) -> Self {
        LoadError::ExecutionError { path, source: Arc::from(source) }
    }
}

fn requested_by_suffix(requested_by: &Option<PathBuf>) -> String {
    match requested_by {
        Some(p) => format!(" (requested by '{}')", p.display()),
        None => String::new(),
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A malformed configuration. These are the only errors the loader surfaces
/// as `Err` rather than as a failed `LoadResult`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("At least one declaration marker is required")]
    NoMarkers,
    #[error("Invalid marker '{0}': markers must be non-empty words")]
    InvalidMarker(String),
    #[error("Invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        source: globset::Error,
    },
    #[error("Invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        source: regex::Error,
    },
    #[error("Could not read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}
