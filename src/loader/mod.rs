//! Orchestrates resolution, the registry and the host executor.
pub mod engine;
pub mod executor;
pub mod result;

pub use engine::Loader;
pub use executor::Executor;
pub use result::{DirectoryReport, FailedUnit, LoadResult};

#[cfg(test)]
mod tests;
