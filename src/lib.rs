// Crate facade: a dependency-aware loader for loosely organised source files.
//
// Units declare what they need in their leading lines (`@requires x.R`).
// The loader resolves those references, loads dependencies first, hands each
// unit's text to a host-supplied executor exactly once, and reports failures
// (unresolved references, cycles, exhausted retries, execution errors)
// without aborting the rest of a batch.

pub mod analysis;
pub mod config;
pub mod display;
pub mod error;
pub mod loader;
pub mod source;
pub mod store;

pub use analysis::{InitPlan, ModuleDecl, PlanError};
pub use config::LoaderConfig;
pub use error::{ConfigError, ErrorKind, ExecuteError, LoadError};
pub use loader::{DirectoryReport, Executor, FailedUnit, LoadResult, Loader};
pub use store::{DependencyReference, LoadRegistry, UnitStatus};
