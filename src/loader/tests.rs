//! End-to-end loader scenarios on temporary directory trees.
use super::*;
use crate::config::LoaderConfig;
use crate::error::{ErrorKind, ExecuteError, LoadError};
use crate::store::UnitStatus;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

type TestExecutor = Box<dyn FnMut(&Path, &str) -> Result<(), ExecuteError>>;
type ExecLog = Rc<RefCell<Vec<PathBuf>>>;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        Self { _dir: dir, root }
    }

    /// Writes a unit whose header declares `deps`, followed by `body`.
    fn unit(&self, rel: &str, deps: &[&str], body: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut text = String::new();
        for dep in deps {
            text.push_str(&format!("#' @requires {}\n", dep));
        }
        text.push_str(body);
        fs::write(&path, text).unwrap();
        path
    }

    fn path(&self, rel: &str) -> PathBuf { self.root.join(rel) }

    fn config(&self) -> LoaderConfig {
        LoaderConfig::default().with_base_dir(&self.root)
    }

    fn loader(&self, config: LoaderConfig) -> (Loader<TestExecutor>, ExecLog) {
        let log: ExecLog = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        // Bodies containing FAIL return an error; PANIC panics.
        let executor: TestExecutor = Box::new(move |path: &Path, source: &str| -> Result<(), ExecuteError> {
            if source.contains("PANIC") {
                panic!("host blew up");
            }
            if source.contains("FAIL") {
                return Err(format!("cannot evaluate {}", path.display()).into());
            }
            sink.borrow_mut().push(path.to_path_buf());
            Ok(())
        });
        (Loader::new(config, executor).unwrap(), log)
    }
}

fn status_of<E: Executor>(loader: &Loader<E>, path: &Path) -> UnitStatus {
    loader.registry().status(path)
}

fn error_kind_of<E: Executor>(loader: &Loader<E>, path: &Path) -> Option<ErrorKind> {
    loader.registry().get(path)?.last_error.as_ref().map(LoadError::kind)
}

#[test]
fn test_load_is_idempotent() {
    let fx = Fixture::new();
    fx.unit("a.R", &[], "a <- 1\n");
    let (mut loader, log) = fx.loader(fx.config());

    let first = loader.load("a.R");
    assert!(first.is_success());
    assert!(!first.cached);

    let second = loader.load("a");
    assert!(second.is_success());
    assert!(second.cached);
    assert_eq!(*log.borrow(), vec![fx.path("a.R")]);
}

#[test]
fn test_dependencies_complete_first() {
    let fx = Fixture::new();
    fx.unit("a.R", &["b"], "a <- b + 1\n");
    fx.unit("b.R", &[], "b <- 1\n");
    let (mut loader, log) = fx.loader(fx.config());

    let result = loader.load("a");
    assert!(result.is_success());
    assert_eq!(result.dependencies, vec![fx.path("b.R")]);
    assert_eq!(*log.borrow(), vec![fx.path("b.R"), fx.path("a.R")]);
    assert_eq!(loader.loaded_files(), vec![fx.path("b.R"), fx.path("a.R")]);
}

#[test]
fn test_cycle_terminates_and_fails_both() {
    let fx = Fixture::new();
    fx.unit("x.R", &["y.R"], "");
    fx.unit("y.R", &["x.R"], "");
    let (mut loader, log) = fx.loader(fx.config());

    let result = loader.load("x");
    assert!(!result.is_success());
    assert_eq!(result.error_kind(), Some(ErrorKind::CyclicDependency));

    for name in ["x.R", "y.R"] {
        let path = fx.path(name);
        assert_eq!(status_of(&loader, &path), UnitStatus::Failed);
        assert_eq!(error_kind_of(&loader, &path), Some(ErrorKind::CyclicDependency));
        assert_eq!(loader.registry().get(&path).unwrap().attempts, 1);
    }
    assert!(log.borrow().is_empty());
    assert!(loader.registry().loading_stack().is_empty());
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let fx = Fixture::new();
    fx.unit("me.R", &["me"], "");
    let (mut loader, _) = fx.loader(fx.config());

    let result = loader.load("me");
    assert_eq!(result.error_kind(), Some(ErrorKind::CyclicDependency));
    match result.error.unwrap().root_cause() {
        LoadError::CyclicDependency { cycle } => {
            assert_eq!(cycle, &vec![fx.path("me.R"), fx.path("me.R")]);
        }
        other => panic!("Wrong root cause: {:?}", other),
    }
}

#[test]
fn test_attempts_are_bounded() {
    let fx = Fixture::new();
    fx.unit("u.R", &["missing"], "");
    let (mut loader, log) = fx.loader(fx.config().with_max_attempts(3));

    let kinds: Vec<Option<ErrorKind>> = (0..5).map(|_| loader.load("u").error_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::UnresolvedDependency),
            Some(ErrorKind::UnresolvedDependency),
            Some(ErrorKind::UnresolvedDependency),
            Some(ErrorKind::AttemptLimitExceeded),
            Some(ErrorKind::AttemptLimitExceeded),
        ]
    );
    assert_eq!(loader.registry().get(&fx.path("u.R")).unwrap().attempts, 3);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_reset_semantics() {
    let fx = Fixture::new();
    fx.unit("a.R", &[], "");
    let (mut loader, log) = fx.loader(fx.config());

    loader.load("a");
    loader.reset_registry(false);
    assert!(loader.load("a").cached);
    assert_eq!(log.borrow().len(), 1);

    loader.reset_registry(true);
    assert!(loader.loaded_files().is_empty());
    let again = loader.load("a");
    assert!(again.is_success() && !again.cached);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn test_soft_reset_restores_attempt_budget() {
    let fx = Fixture::new();
    fx.unit("u.R", &["later"], "");
    let (mut loader, _) = fx.loader(fx.config().with_max_attempts(1));

    loader.load("u");
    assert_eq!(loader.load("u").error_kind(), Some(ErrorKind::AttemptLimitExceeded));

    fx.unit("later.R", &[], "");
    loader.reset_registry(false);
    assert!(loader.load("u").is_success());
}

#[test]
fn test_retry_picks_up_file_created_mid_session() {
    let fx = Fixture::new();
    fx.unit("u.R", &["later"], "");
    let (mut loader, log) = fx.loader(fx.config());

    assert_eq!(loader.load("u").error_kind(), Some(ErrorKind::UnresolvedDependency));
    fx.unit("later.R", &[], "");

    let retry = loader.load("u");
    assert!(retry.is_success());
    assert_eq!(*log.borrow(), vec![fx.path("later.R"), fx.path("u.R")]);
    assert_eq!(loader.registry().get(&fx.path("u.R")).unwrap().attempts, 2);
}

#[test]
fn test_directory_load_is_sorted_and_filtered() {
    let fx = Fixture::new();
    for rel in ["b.R", "a/z.R", "a.R", "a/b/c.R", "d/e/f.R"] {
        fx.unit(&format!("scripts/{}", rel), &[], "");
    }
    for rel in ["notes.txt", "a/readme.md", "d/e/data.csv"] {
        fx.unit(&format!("scripts/{}", rel), &[], "");
    }
    let (mut loader, log) = fx.loader(fx.config());

    let report = loader
        .load_directory(Path::new("scripts"), Some("*.R"), None, Some(3))
        .unwrap();

    let expected: Vec<PathBuf> = ["a.R", "a/b/c.R", "a/z.R", "b.R", "d/e/f.R"]
        .iter()
        .map(|rel| fx.path(&format!("scripts/{}", rel)))
        .collect();
    assert_eq!(report.loaded, expected);
    assert!(report.is_clean());
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn test_directory_respects_depth_and_exclude() {
    let fx = Fixture::new();
    fx.unit("scripts/top.R", &[], "");
    fx.unit("scripts/99_archive/old.R", &[], "");
    fx.unit("scripts/one/two/deep.R", &[], "");
    let (mut loader, _) = fx.loader(fx.config());

    let report = loader
        .load_directory(Path::new("scripts"), Some("*.R"), Some("re:archive"), Some(2))
        .unwrap();
    assert_eq!(report.loaded, vec![fx.path("scripts/top.R")]);
}

#[test]
fn test_directory_dependency_loaded_once() {
    let fx = Fixture::new();
    fx.unit("scripts/a.R", &["shared"], "");
    fx.unit("scripts/b.R", &["shared"], "");
    fx.unit("scripts/shared.R", &[], "");
    let (mut loader, log) = fx.loader(fx.config());

    let report = loader.load_directory(Path::new("scripts"), None, None, None).unwrap();
    assert_eq!(report.loaded.len(), 3);
    assert_eq!(
        *log.borrow(),
        vec![fx.path("scripts/shared.R"), fx.path("scripts/a.R"), fx.path("scripts/b.R")]
    );
}

#[test]
fn test_resolution_prefers_same_directory() {
    let fx = Fixture::new();
    fx.unit("app/main.R", &["shared"], "");
    fx.unit("app/shared.R", &[], "");
    fx.unit("lib/shared.R", &[], "");
    let config = fx.config().with_search_roots(["lib"]);
    let (mut loader, log) = fx.loader(config);

    assert!(loader.load("app/main.R").is_success());
    assert_eq!(*log.borrow(), vec![fx.path("app/shared.R"), fx.path("app/main.R")]);
}

#[test]
fn test_search_roots_supply_missing_units() {
    let fx = Fixture::new();
    fx.unit("app/main.R", &["fn_format"], "");
    fx.unit("global_scripts/fn_format.R", &[], "");
    let config = fx.config().with_search_roots(["global_scripts"]);
    let (mut loader, _) = fx.loader(config);

    let result = loader.load("app/main.R");
    assert!(result.is_success());
    assert_eq!(result.dependencies, vec![fx.path("global_scripts/fn_format.R")]);
}

#[test]
fn test_partial_failure_isolation() {
    let fx = Fixture::new();
    fx.unit("batch/a.R", &[], "");
    fx.unit("batch/b.R", &[], "");
    fx.unit("batch/c.R", &["nowhere"], "");
    fx.unit("batch/d.R", &[], "");
    fx.unit("batch/e.R", &[], "");
    let (mut loader, _) = fx.loader(fx.config());

    let report = loader.load_directory(Path::new("batch"), None, None, None).unwrap();
    assert_eq!(report.loaded.len(), 4);
    assert_eq!(report.failed_paths(), vec![fx.path("batch/c.R")]);
    assert_eq!(report.failed[0].kind, ErrorKind::UnresolvedDependency);
    for name in ["a.R", "b.R", "d.R", "e.R"] {
        assert_eq!(status_of(&loader, &fx.path(&format!("batch/{}", name))), UnitStatus::Loaded);
    }
}

#[test]
fn test_execution_errors_are_contained() {
    let fx = Fixture::new();
    fx.unit("bad.R", &[], "FAIL\n");
    fx.unit("boom.R", &[], "PANIC\n");
    fx.unit("top.R", &["bad"], "");
    let (mut loader, log) = fx.loader(fx.config());

    let result = loader.load("top");
    assert_eq!(result.error_kind(), Some(ErrorKind::ExecutionError));
    assert!(matches!(result.error, Some(LoadError::DependencyFailed { .. })));
    assert_eq!(status_of(&loader, &fx.path("top.R")), UnitStatus::Failed);

    let panicked = loader.load("boom");
    assert_eq!(panicked.error_kind(), Some(ErrorKind::ExecutionError));
    assert!(panicked.error.unwrap().to_string().contains("host blew up"));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_failed_dependency_not_retried_within_one_call() {
    let fx = Fixture::new();
    fx.unit("top.R", &["left", "right"], "");
    fx.unit("left.R", &["broken"], "");
    fx.unit("right.R", &["broken"], "");
    fx.unit("broken.R", &[], "FAIL\n");
    let (mut loader, _) = fx.loader(fx.config());

    loader.load("top");
    assert_eq!(loader.registry().get(&fx.path("broken.R")).unwrap().attempts, 1);
    assert_eq!(
        loader.registry().get(&fx.path("top.R")).unwrap().resolved,
        vec![fx.path("left.R"), fx.path("right.R")]
    );
}

#[test]
fn test_directory_cycle_fails_every_member_once() {
    let fx = Fixture::new();
    fx.unit("ring/w.R", &["x"], "");
    fx.unit("ring/x.R", &["y"], "");
    fx.unit("ring/y.R", &["z"], "");
    fx.unit("ring/z.R", &["w"], "");
    let (mut loader, log) = fx.loader(fx.config().with_max_attempts(3));

    let report = loader.load_directory(Path::new("ring"), None, None, None).unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(report.failed.len(), 4);
    for failed in &report.failed {
        assert_eq!(failed.kind, ErrorKind::CyclicDependency, "{}", failed.path.display());
    }
    for name in ["w.R", "x.R", "y.R", "z.R"] {
        let path = fx.path(&format!("ring/{}", name));
        assert_eq!(error_kind_of(&loader, &path), Some(ErrorKind::CyclicDependency));
        assert_eq!(loader.registry().get(&path).unwrap().attempts, 1);
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn test_directory_shared_failure_executes_once() {
    let fx = Fixture::new();
    fx.unit("batch/a.R", &["shared"], "");
    fx.unit("batch/c.R", &["shared"], "");
    fx.unit("batch/d.R", &["shared"], "");
    fx.unit("batch/shared.R", &[], "FAIL\n");
    let calls: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let executor = move |path: &Path, source: &str| -> Result<(), ExecuteError> {
        sink.borrow_mut().push(path.to_path_buf());
        if source.contains("FAIL") {
            return Err("boom".into());
        }
        Ok(())
    };
    let mut loader = Loader::new(fx.config().with_max_attempts(3), executor).unwrap();

    let report = loader.load_directory(Path::new("batch"), None, None, None).unwrap();
    assert_eq!(*calls.borrow(), vec![fx.path("batch/shared.R")]);
    assert_eq!(report.failed.len(), 4);
    for failed in &report.failed {
        assert_eq!(failed.kind, ErrorKind::ExecutionError, "{}", failed.path.display());
    }
    assert_eq!(loader.registry().get(&fx.path("batch/shared.R")).unwrap().attempts, 1);

    // A new top-level call may retry it.
    loader.load("batch/shared.R");
    assert_eq!(calls.borrow().len(), 2);
}

/// `target` expressed relative to the working directory.
#[cfg(unix)]
fn relative_from_cwd(target: &Path) -> PathBuf {
    let cwd = fs::canonicalize(std::env::current_dir().unwrap()).unwrap();
    let mut rel = PathBuf::new();
    for _ in cwd.components().skip(1) {
        rel.push("..");
    }
    rel.push(target.strip_prefix("/").unwrap());
    rel
}

#[cfg(unix)]
#[test]
fn test_relative_base_dir_reaches_search_roots() {
    let fx = Fixture::new();
    fx.unit("app/main.R", &["fn_format"], "");
    fx.unit("global_scripts/fn_format.R", &[], "");
    let config = LoaderConfig::default()
        .with_base_dir(relative_from_cwd(&fx.root))
        .with_search_roots(["global_scripts"]);
    let (mut loader, log) = fx.loader(config);

    let result = loader.load("app/main.R");
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(*log.borrow(), vec![fx.path("global_scripts/fn_format.R"), fx.path("app/main.R")]);
}

#[test]
fn test_unresolved_entry_reference() {
    let fx = Fixture::new();
    let (mut loader, _) = fx.loader(fx.config());

    let result = loader.load("ghost");
    assert!(result.path.is_none());
    assert_eq!(result.error_kind(), Some(ErrorKind::UnresolvedDependency));
    assert_eq!(loader.registry().count(), 0);
}

#[test]
fn test_invalid_pattern_is_a_config_error() {
    let fx = Fixture::new();
    let (mut loader, _) = fx.loader(fx.config());
    assert!(loader.load_directory(Path::new("."), Some("re:(("), None, None).is_err());
    assert!(Loader::new(LoaderConfig::default().with_max_attempts(0), |_: &Path, _: &str| -> Result<(), ExecuteError> { Ok(()) }).is_err());
}

#[test]
fn test_configured_directory_uses_config_patterns() {
    let fx = Fixture::new();
    fx.unit("scripts/keep.R", &[], "");
    fx.unit("scripts/skip.py", &[], "");
    let mut config = fx.config();
    config.include_pattern = Some("*.R".to_string());
    let (mut loader, _) = fx.loader(config);

    let report = loader.load_configured_directory(Path::new("scripts"), None);
    assert_eq!(report.loaded, vec![fx.path("scripts/keep.R")]);
    assert!(report.to_json().unwrap().contains("keep.R"));
}

#[test]
fn test_plan_directory_without_execution() {
    let fx = Fixture::new();
    fx.unit("scripts/a.R", &["c"], "");
    fx.unit("scripts/b.R", &[], "");
    fx.unit("scripts/c.R", &["ext_helper"], "");
    fx.unit("lib/ext_helper.R", &[], "");
    let config = fx.config().with_search_roots(["lib"]);
    let (mut loader, log) = fx.loader(config);

    let order = loader.plan_directory(Path::new("scripts"), None, None, None).unwrap();
    assert_eq!(
        order,
        vec![
            fx.path("lib/ext_helper.R"),
            fx.path("scripts/c.R"),
            fx.path("scripts/a.R"),
            fx.path("scripts/b.R"),
        ]
    );
    assert!(log.borrow().is_empty());
    assert!(loader.registry().cached_dependencies(&fx.path("scripts/a.R")).is_some());
}

#[test]
fn test_trace_renders_tree() {
    let fx = Fixture::new();
    fx.unit("a.R", &["b"], "");
    fx.unit("b.R", &[], "");
    let (mut loader, _) = fx.loader(fx.config());

    assert!(loader.trace("a").is_none());
    loader.load("a");
    let text = loader.trace("a").unwrap();
    assert!(text.contains("[L1] a.R [Loaded, attempts=1]"));
    assert!(text.contains("`-- [L2] b.R [Loaded, attempts=1]"));
}
