//! Everything that reads the filesystem: declaration scanning, reference
//! resolution and directory discovery.
pub mod annotation;
pub mod matcher;
pub mod resolver;
pub mod walker;

pub use annotation::{AnnotationExtractor, Dependencies};
pub use matcher::Matcher;
pub use resolver::{PathResolver, Resolution};
pub use walker::{DirectoryWalker, WalkOutcome, WalkWarning};
