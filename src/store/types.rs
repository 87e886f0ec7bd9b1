use crate::error::{ErrorKind, LoadError};
use crate::source::annotation::Dependencies;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The raw, unresolved string naming a required unit, as written in a
/// declaration. May be a bare name, a relative path or an absolute path,
/// with or without an extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyReference(pub String);

impl DependencyReference {
    pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn as_path(&self) -> &Path { Path::new(&self.0) }

    pub fn has_extension(&self) -> bool {
        self.as_path().extension().is_some()
    }
}

impl fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// One loadable file, keyed by its canonical path.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub canonical_path: PathBuf,
    /// Extracted once per registry lifetime; `None` until first discovered.
    pub dependencies: Option<Dependencies>,
    /// Dependency paths resolved during the most recent attempt.
    pub resolved: Vec<PathBuf>,
    pub status: UnitStatus,
    pub attempts: u32,
    pub last_error: Option<LoadError>,
}

impl SourceUnit {
    pub fn new(canonical_path: PathBuf) -> Self {
        Self {
            canonical_path,
            dependencies: None,
            resolved: Vec::new(),
            status: UnitStatus::NotLoaded,
            attempts: 0,
            last_error: None,
        }
    }
}

/// A serialisable view of one registry entry, for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    pub path: PathBuf,
    pub status: UnitStatus,
    pub attempts: u32,
    pub error: Option<ErrorKind>,
}

impl From<&SourceUnit> for UnitSnapshot {
    fn from(unit: &SourceUnit) -> Self {
        Self {
            path: unit.canonical_path.clone(),
            status: unit.status,
            attempts: unit.attempts,
            error: unit.last_error.as_ref().map(LoadError::kind),
        }
    }
}
