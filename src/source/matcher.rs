//! Include/exclude matchers for the directory walker.
use crate::error::ConfigError;
use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::path::Path;

const REGEX_PREFIX: &str = "re:";

/// A path matcher: a glob by default, or a regular expression when the
/// pattern starts with `re:`.
#[derive(Debug, Clone)]
pub enum Matcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl Matcher {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if let Some(expr) = pattern.strip_prefix(REGEX_PREFIX) {
            let re = Regex::new(expr).map_err(|source| ConfigError::Regex {
                pattern: pattern.to_string(),
                source,
            })?;
            return Ok(Matcher::Regex(re));
        }
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Matcher::Glob(glob.compile_matcher()))
    }

    pub fn parse_optional(pattern: Option<&str>) -> Result<Option<Self>, ConfigError> {
        pattern.map(Self::parse).transpose()
    }

    /// Matches against a path relative to the walk root. Regexes see the
    /// path with `/` separators on every platform.
    pub fn is_match(&self, relative: &Path) -> bool {
        match self {
            Matcher::Glob(glob) => glob.is_match(relative),
            Matcher::Regex(re) => {
                let text = relative.to_string_lossy().replace('\\', "/");
                re.is_match(&text)
            }
        }
    }
}
