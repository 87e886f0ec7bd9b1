//! Session state: what has been loaded, what is loading, and how often each
//! unit has been attempted.
pub mod registry;
pub mod types;

pub use registry::{BeginLoad, LoadRegistry};
pub use types::{DependencyReference, SourceUnit, UnitSnapshot, UnitStatus};
