//! Human-facing output: structured log events and dependency trees.
pub mod diagnostics;
pub mod trace;

pub use diagnostics::Diagnostics;
pub use trace::format_trace;
