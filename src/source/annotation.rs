//! Extracts declared dependency references from the head of a source unit.
//!
//! A declaration is a line such as `#' @requires fn_utils.R` or
//! `// @depends a, b`. Only the first `scan_lines` lines are examined.

use crate::error::ConfigError;
use crate::store::DependencyReference;
use regex::Regex;
use smallvec::SmallVec;

/// Dependency list of one unit. Most units declare only a handful.
pub type Dependencies = SmallVec<[DependencyReference; 4]>;

#[derive(Debug, Clone)]
pub struct AnnotationExtractor {
    pattern: Regex,
    scan_lines: usize,
}

impl AnnotationExtractor {
    pub fn new<S: AsRef<str>>(markers: &[S], scan_lines: usize) -> Result<Self, ConfigError> {
        if markers.is_empty() {
            return Err(ConfigError::NoMarkers);
        }
        let alternatives: Vec<String> = markers.iter().map(|m| regex::escape(m.as_ref())).collect();
        // Optional comment leader, then `@marker`, then the reference list.
        let source = format!(
            r"(?i)^\s*(?:#+'?|//+|--|;+)?\s*@(?:{})\s+(.+?)\s*$",
            alternatives.join("|")
        );
        let pattern = Regex::new(&source).map_err(|source_err| ConfigError::Regex {
            pattern: source,
            source: source_err,
        })?;
        Ok(Self { pattern, scan_lines })
    }

    /// Returns references in declaration order, each once. An empty list is
    /// not an error.
    pub fn extract(&self, text: &str) -> Dependencies {
        let mut found = Dependencies::new();
        for line in text.lines().take(self.scan_lines) {
            let Some(caps) = self.pattern.captures(line) else { continue };
            let Some(list) = caps.get(1) else { continue };
            for raw in list.as_str().split(|c: char| c == ',' || c.is_whitespace()) {
                let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'');
                if cleaned.is_empty() {
                    continue;
                }
                let reference = DependencyReference::new(cleaned);
                if !found.contains(&reference) {
                    found.push(reference);
                }
            }
        }
        found
    }
}
