use super::types::*;
use crate::error::LoadError;
use crate::source::annotation::Dependencies;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of `LoadRegistry::begin_load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginLoad {
    Ok,
    /// The path is already on the loading stack. Carries the cycle, starting
    /// and ending with the requested path.
    Cyclic(Vec<PathBuf>),
    /// The attempt budget is spent; the unit is now `Failed`.
    AttemptLimitExceeded { attempts: u32 },
}

/// Session state for every known unit: status, attempt counts, cached
/// metadata, and the stack of units currently being loaded.
#[derive(Debug, Clone)]
pub struct LoadRegistry {
    units: HashMap<PathBuf, SourceUnit>,
    /// Active recursion guard. A path appears here at most once.
    loading_stack: Vec<PathBuf>,
    /// Paths that reached `Loaded`, in completion order.
    completed: Vec<PathBuf>,
    max_attempts: u32,
}

impl LoadRegistry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            units: HashMap::new(),
            loading_stack: Vec::new(),
            completed: Vec::new(),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 { self.max_attempts }
    pub fn count(&self) -> usize { self.units.len() }

    pub fn get(&self, path: &Path) -> Option<&SourceUnit> { self.units.get(path) }

    pub fn status(&self, path: &Path) -> UnitStatus {
        self.units.get(path).map_or(UnitStatus::NotLoaded, |u| u.status)
    }

    pub fn is_loading(&self, path: &Path) -> bool {
        self.loading_stack.iter().any(|p| p == path)
    }

    pub fn loading_stack(&self) -> &[PathBuf] { &self.loading_stack }

    /// Registers the path if it is unknown and returns its entry.
    pub(crate) fn entry(&mut self, path: &Path) -> &mut SourceUnit {
        self.units
            .entry(path.to_path_buf())
            .or_insert_with(|| SourceUnit::new(path.to_path_buf()))
    }

    /// Stores extracted metadata. Later calls for the same unit are ignored,
    /// so a unit is only ever scanned once per registry lifetime.
    pub(crate) fn cache_dependencies(&mut self, path: &Path, deps: Dependencies) {
        let unit = self.entry(path);
        if unit.dependencies.is_none() {
            unit.dependencies = Some(deps);
        }
    }

    pub fn cached_dependencies(&self, path: &Path) -> Option<&Dependencies> {
        self.units.get(path)?.dependencies.as_ref()
    }

    pub(crate) fn set_resolved(&mut self, path: &Path, resolved: Vec<PathBuf>) {
        self.entry(path).resolved = resolved;
    }

    /// The only mutator of the loading stack. Membership is checked before
    /// anything else, so a cycle never consumes an attempt.
    pub fn begin_load(&mut self, path: &Path) -> BeginLoad {
        // 1. Cycle guard
        if let Some(pos) = self.loading_stack.iter().position(|p| p == path) {
            let mut cycle = self.loading_stack[pos..].to_vec();
            cycle.push(path.to_path_buf());
            return BeginLoad::Cyclic(cycle);
        }

        // 2. Attempt budget
        let max_attempts = self.max_attempts;
        let unit = self.entry(path);
        if unit.attempts >= max_attempts {
            unit.status = UnitStatus::Failed;
            unit.last_error = Some(LoadError::AttemptLimitExceeded {
                path: path.to_path_buf(),
                attempts: unit.attempts,
                max_attempts,
            });
            return BeginLoad::AttemptLimitExceeded { attempts: unit.attempts };
        }

        // 3. Enter Loading
        unit.attempts += 1;
        unit.status = UnitStatus::Loading;
        unit.last_error = None;
        self.loading_stack.push(path.to_path_buf());
        BeginLoad::Ok
    }

    /// Pops the path off the loading stack and sets its terminal status.
    pub fn end_load(&mut self, path: &Path, outcome: Result<(), LoadError>) {
        if let Some(pos) = self.loading_stack.iter().rposition(|p| p == path) {
            self.loading_stack.remove(pos);
        }
        let unit = self.entry(path);
        match outcome {
            Ok(()) => {
                unit.status = UnitStatus::Loaded;
                unit.last_error = None;
                self.completed.push(path.to_path_buf());
            }
            Err(err) => {
                unit.status = UnitStatus::Failed;
                unit.last_error = Some(err);
            }
        }
    }

    /// Loaded paths in completion order.
    pub fn loaded_files(&self) -> &[PathBuf] { &self.completed }

    /// `clear_loaded = true` drops every unit. Otherwise only attempt
    /// counters are cleared; `Loaded` units and cached metadata survive, and
    /// `Failed` units become eligible again.
    pub fn reset(&mut self, clear_loaded: bool) {
        self.loading_stack.clear();
        if clear_loaded {
            self.units.clear();
            self.completed.clear();
            return;
        }
        for unit in self.units.values_mut() {
            unit.attempts = 0;
            if unit.status != UnitStatus::Loaded {
                unit.status = UnitStatus::NotLoaded;
                unit.last_error = None;
            }
        }
    }

    /// All units sorted by path.
    pub fn snapshot(&self) -> Vec<UnitSnapshot> {
        let mut out: Vec<UnitSnapshot> = self.units.values().map(UnitSnapshot::from).collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }
}
