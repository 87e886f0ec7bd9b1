//! The seam to the host environment.
use crate::error::ExecuteError;
use std::path::Path;

/// Runs the text of one unit in the host environment.
///
/// The loader calls this exactly once per successful load, after every
/// dependency of the unit has been executed.
pub trait Executor {
    fn execute(&mut self, path: &Path, source: &str) -> Result<(), ExecuteError>;
}

impl<F> Executor for F
where
    F: FnMut(&Path, &str) -> Result<(), ExecuteError>,
{
    fn execute(&mut self, path: &Path, source: &str) -> Result<(), ExecuteError> {
        self(path, source)
    }
}
