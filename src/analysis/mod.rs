//! Static ordering, computed without executing anything.
pub mod plan;
pub mod topology;

pub use plan::{InitPlan, ModuleDecl, PlanError};
pub use topology::UnitRecord;
