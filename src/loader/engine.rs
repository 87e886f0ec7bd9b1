//! The dependency-aware loader.
//!
//! `Loader` owns the registry, so state lives exactly as long as the value
//! does; tests and hosts that want a fresh session build a new loader or
//! call `reset_registry`. Loading is synchronous and single-threaded: a
//! unit's dependencies are always loaded, or have definitively failed,
//! before its own text reaches the executor.

use super::executor::Executor;
use super::result::{DirectoryReport, FailedUnit, LoadResult};
use crate::analysis::plan::PlanError;
use crate::analysis::topology::{self, UnitRecord};
use crate::config::LoaderConfig;
use crate::display::{format_trace, Diagnostics};
use crate::error::{ConfigError, LoadError};
use crate::source::{AnnotationExtractor, Dependencies, DirectoryWalker, Matcher, PathResolver};
use crate::store::{BeginLoad, DependencyReference, LoadRegistry, UnitStatus};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Loader<E: Executor> {
    config: LoaderConfig,
    registry: LoadRegistry,
    resolver: PathResolver,
    extractor: AnnotationExtractor,
    include: Option<Matcher>,
    exclude: Option<Matcher>,
    diagnostics: Diagnostics,
    executor: E,
    /// Units that failed during the current top-level call (`load`,
    /// `load_file` or one whole directory walk). They are not retried again
    /// until the next call.
    failed_this_pass: HashSet<PathBuf>,
}

impl<E: Executor> Loader<E> {
    pub fn new(config: LoaderConfig, executor: E) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = AnnotationExtractor::new(&config.markers, config.scan_lines)?;
        let include = Matcher::parse_optional(config.include_pattern.as_deref())?;
        let exclude = Matcher::parse_optional(config.exclude_pattern.as_deref())?;
        let resolver = PathResolver::new(
            config.base_dir.clone(),
            config.search_roots.clone(),
            config.extension(),
        );

        Ok(Self {
            registry: LoadRegistry::new(config.max_attempts),
            diagnostics: Diagnostics::new(config.verbose),
            resolver,
            extractor,
            include,
            exclude,
            executor,
            config,
            failed_this_pass: HashSet::new(),
        })
    }

    pub fn config(&self) -> &LoaderConfig { &self.config }
    pub fn registry(&self) -> &LoadRegistry { &self.registry }
    pub fn executor(&self) -> &E { &self.executor }

    // --- Public operations ---

    /// Resolves `reference` against the base directory and search roots,
    /// then loads it. Never panics or returns `Err` for ordinary failures;
    /// inspect the returned `LoadResult`.
    pub fn load(&mut self, reference: &str) -> LoadResult {
        let reference = DependencyReference::new(reference);
        match self.resolver.resolve(&reference, None, None) {
            Ok(resolution) => {
                self.diagnostics.resolved(&reference, None, &resolution);
                self.load_entry(&resolution.path)
            }
            Err(err) => {
                self.diagnostics.failed(None, &err);
                LoadResult::failed(None, Vec::new(), err)
            }
        }
    }

    /// Loads an already-known file path, skipping reference resolution.
    pub fn load_file(&mut self, path: &Path) -> LoadResult {
        match self.canonical(path) {
            Ok(canonical) => self.load_entry(&canonical),
            Err(err) => {
                self.diagnostics.failed(None, &err);
                LoadResult::failed(None, Vec::new(), err)
            }
        }
    }

    /// Walks `root` and loads every matching file in sorted order. A failed
    /// unit never stops the batch. Only malformed patterns return `Err`.
    pub fn load_directory(
        &mut self,
        root: &Path,
        include: Option<&str>,
        exclude: Option<&str>,
        max_depth: Option<usize>,
    ) -> Result<DirectoryReport, ConfigError> {
        let include = Matcher::parse_optional(include)?;
        let exclude = Matcher::parse_optional(exclude)?;
        let walker = DirectoryWalker::new(include, exclude)
            .max_depth(max_depth)
            .follow_links(self.config.follow_links);
        Ok(self.load_walked(root, &walker))
    }

    /// `load_directory` with the include/exclude patterns from the config.
    pub fn load_configured_directory(&mut self, root: &Path, max_depth: Option<usize>) -> DirectoryReport {
        let walker = DirectoryWalker::new(self.include.clone(), self.exclude.clone())
            .max_depth(max_depth)
            .follow_links(self.config.follow_links);
        self.load_walked(root, &walker)
    }

    /// Canonical paths of `Loaded` units, in completion order.
    pub fn loaded_files(&self) -> Vec<PathBuf> {
        self.registry.loaded_files().to_vec()
    }

    pub fn reset_registry(&mut self, clear_loaded: bool) {
        self.registry.reset(clear_loaded);
        self.failed_this_pass.clear();
    }

    /// A printable dependency tree for a unit that has been seen this session.
    pub fn trace(&self, reference: &str) -> Option<String> {
        let resolution = self.resolver.resolve(&DependencyReference::new(reference), None, None).ok()?;
        self.registry.get(&resolution.path)?;
        Some(format_trace(&self.registry, &resolution.path))
    }

    /// Computes the dependency-first order of every matching file under
    /// `root` (plus whatever they pull in from elsewhere) without executing
    /// anything. Extracted metadata is cached in the registry.
    pub fn plan_directory(
        &mut self,
        root: &Path,
        include: Option<&str>,
        exclude: Option<&str>,
        max_depth: Option<usize>,
    ) -> Result<Vec<PathBuf>, PlanError> {
        let walker = DirectoryWalker::new(Matcher::parse_optional(include)?, Matcher::parse_optional(exclude)?)
            .max_depth(max_depth)
            .follow_links(self.config.follow_links);
        let root = self.config.base_dir.join(root);
        let outcome = walker.walk(&root);

        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        for file in &outcome.files {
            queue.push_back(canonicalize_found(file)?);
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut records = Vec::new();
        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let (deps, _) = self.metadata(&path)?;
            let dir = parent_dir(&path);
            let mut resolved = Vec::with_capacity(deps.len());
            for reference in &deps {
                let resolution = self.resolver.resolve(reference, Some(&dir), Some(&path))?;
                queue.push_back(resolution.path.clone());
                resolved.push(resolution.path);
            }
            records.push(UnitRecord { path, dependencies: resolved });
        }

        topology::sort(&records)
    }

    // --- Traversal ---

    fn load_walked(&mut self, root: &Path, walker: &DirectoryWalker) -> DirectoryReport {
        let root = self.config.base_dir.join(root);
        let outcome = walker.walk(&root);
        let mut report = DirectoryReport {
            root: root.clone(),
            warnings: outcome.warnings,
            ..Default::default()
        };

        // The whole walk is one top-level call: a unit that fails here is not
        // retried by later files in the same batch.
        self.failed_this_pass.clear();
        for file in &outcome.files {
            let result = match canonicalize_found(file) {
                Ok(canonical) => self.load_canonical(&canonical),
                Err(err) => {
                    self.diagnostics.failed(None, &err);
                    LoadResult::failed(None, Vec::new(), err)
                }
            };
            match (result.path, result.error) {
                (Some(path), None) => report.loaded.push(path),
                (path, Some(err)) => report.failed.push(FailedUnit {
                    path: path.unwrap_or_else(|| file.clone()),
                    kind: err.kind(),
                    message: err.to_string(),
                }),
                (None, None) => {}
            }
        }

        self.diagnostics.directory_summary(&root, report.loaded.len(), report.failed.len());
        report
    }

    fn load_entry(&mut self, path: &Path) -> LoadResult {
        self.failed_this_pass.clear();
        self.load_canonical(path)
    }

    fn load_canonical(&mut self, path: &Path) -> LoadResult {
        // 1. Idempotence
        if let Some(unit) = self.registry.get(path) {
            if unit.status == UnitStatus::Loaded {
                self.diagnostics.cache_hit(path);
                return LoadResult::cached(path.to_path_buf(), unit.resolved.clone());
            }
            if unit.status == UnitStatus::Failed && self.failed_this_pass.contains(path) {
                if let Some(err) = unit.last_error.clone() {
                    return LoadResult::failed(Some(path.to_path_buf()), unit.resolved.clone(), err);
                }
            }
        }

        // 2. Cycle guard and attempt budget
        let begin = self.registry.begin_load(path);
        let attempts = self.registry.get(path).map_or(0, |u| u.attempts);
        self.diagnostics.begin(path, &begin, attempts);
        match begin {
            BeginLoad::Ok => {}
            BeginLoad::Cyclic(cycle) => {
                // The unit is still on the stack; its own frame settles its status.
                let err = LoadError::CyclicDependency { cycle };
                self.diagnostics.failed(Some(path), &err);
                return LoadResult::failed(Some(path.to_path_buf()), Vec::new(), err);
            }
            BeginLoad::AttemptLimitExceeded { attempts } => {
                let err = LoadError::AttemptLimitExceeded {
                    path: path.to_path_buf(),
                    attempts,
                    max_attempts: self.registry.max_attempts(),
                };
                self.failed_this_pass.insert(path.to_path_buf());
                self.diagnostics.failed(Some(path), &err);
                return LoadResult::failed(Some(path.to_path_buf()), Vec::new(), err);
            }
        }

        // 3. Dependencies, then the unit itself
        let (resolved, outcome) = self.load_body(path);
        self.registry.end_load(path, outcome.clone());
        match outcome {
            Ok(()) => {
                self.diagnostics.loaded(path);
                LoadResult::loaded(path.to_path_buf(), resolved)
            }
            Err(err) => {
                self.failed_this_pass.insert(path.to_path_buf());
                self.diagnostics.failed(Some(path), &err);
                LoadResult::failed(Some(path.to_path_buf()), resolved, err)
            }
        }
    }

    /// Loads every declared dependency, then executes the unit if all of
    /// them succeeded. Returns the resolved dependency paths either way.
    fn load_body(&mut self, path: &Path) -> (Vec<PathBuf>, Result<(), LoadError>) {
        let (deps, text) = match self.metadata(path) {
            Ok(found) => found,
            Err(err) => return (Vec::new(), Err(err)),
        };
        self.diagnostics.dependencies(path, &deps);

        let dir = parent_dir(path);
        let mut resolved = Vec::with_capacity(deps.len());
        let mut first_failure: Option<LoadError> = None;

        for reference in &deps {
            match self.resolver.resolve(reference, Some(&dir), Some(path)) {
                Ok(resolution) => {
                    self.diagnostics.resolved(reference, Some(path), &resolution);
                    let dep = resolution.path;
                    let result = self.load_canonical(&dep);
                    if let Some(err) = result.error {
                        if first_failure.is_none() {
                            first_failure = Some(LoadError::DependencyFailed {
                                path: path.to_path_buf(),
                                dependency: dep.clone(),
                                source: Box::new(err),
                            });
                        }
                    }
                    resolved.push(dep);
                }
                Err(err) => {
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        self.registry.set_resolved(path, resolved.clone());
        if let Some(err) = first_failure {
            return (resolved, Err(err));
        }

        let text = match text {
            Some(text) => text,
            None => match read_unit(path) {
                Ok(text) => text,
                Err(err) => return (resolved, Err(err)),
            },
        };
        (resolved, self.execute(path, &text))
    }

    /// Declared dependencies of a unit, scanned once per registry lifetime.
    /// Returns the text too when it had to be read.
    fn metadata(&mut self, path: &Path) -> Result<(Dependencies, Option<String>), LoadError> {
        if let Some(deps) = self.registry.cached_dependencies(path) {
            return Ok((deps.clone(), None));
        }
        let text = read_unit(path)?;
        let deps = self.extractor.extract(&text);
        self.registry.cache_dependencies(path, deps.clone());
        Ok((deps, Some(text)))
    }

    fn execute(&mut self, path: &Path, text: &str) -> Result<(), LoadError> {
        self.diagnostics.executing(path);
        let executor = &mut self.executor;
        match catch_unwind(AssertUnwindSafe(|| executor.execute(path, text))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(LoadError::execution(path.to_path_buf(), source)),
            Err(payload) => Err(LoadError::execution(path.to_path_buf(), panic_message(payload).into())),
        }
    }

    fn canonical(&self, path: &Path) -> Result<PathBuf, LoadError> {
        let joined = self.config.base_dir.join(path);
        if !joined.is_file() {
            return Err(LoadError::UnresolvedDependency {
                reference: path.display().to_string(),
                requested_by: None,
                tried: vec![joined],
            });
        }
        canonicalize_found(&joined)
    }
}

/// Canonicalises a path the walker or a caller has already located.
fn canonicalize_found(path: &Path) -> Result<PathBuf, LoadError> {
    fs::canonicalize(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

fn read_unit(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map_or_else(|| PathBuf::from("/"), Path::to_path_buf)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic during execution: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic during execution: {}", msg)
    } else {
        "panic during execution".to_string()
    }
}
