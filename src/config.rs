//! Loader configuration.
use crate::error::ConfigError;
use crate::source::matcher::Matcher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SCAN_LINES: usize = 30;
pub const DEFAULT_EXTENSION: &str = "R";

/// Recognized loader options. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Log every resolution decision and full error chains.
    pub verbose: bool,
    pub max_attempts: u32,
    /// Ordered; earlier roots win when a reference is ambiguous.
    pub search_roots: Vec<PathBuf>,
    /// Implicit root for entry references and relative search roots.
    pub base_dir: PathBuf,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
    /// Appended to references that carry no extension. Stored without the dot.
    pub default_extension: String,
    /// How many leading lines of a unit are scanned for declarations.
    pub scan_lines: usize,
    /// Synonymous declaration markers, written without the leading `@`.
    pub markers: Vec<String>,
    pub follow_links: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            search_roots: Vec::new(),
            base_dir: PathBuf::from("."),
            include_pattern: None,
            exclude_pattern: None,
            default_extension: DEFAULT_EXTENSION.to_string(),
            scan_lines: DEFAULT_SCAN_LINES,
            markers: vec!["requires".to_string(), "depends".to_string()],
            follow_links: true,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self { Self::default() }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file. Relative `base_dir` values are taken
    /// against the directory holding the file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&text)?;
        if config.base_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.base_dir = parent.join(&config.base_dir);
            }
        }
        Ok(config)
    }

    pub fn with_search_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Rejects values the loader cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.markers.is_empty() {
            return Err(ConfigError::NoMarkers);
        }
        for marker in &self.markers {
            let valid = !marker.is_empty()
                && marker.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(ConfigError::InvalidMarker(marker.clone()));
            }
        }
        Matcher::parse_optional(self.include_pattern.as_deref())?;
        Matcher::parse_optional(self.exclude_pattern.as_deref())?;
        Ok(())
    }

    /// The extension without a leading dot, or `None` when disabled.
    pub(crate) fn extension(&self) -> Option<&str> {
        let ext = self.default_extension.trim_start_matches('.');
        if ext.is_empty() { None } else { Some(ext) }
    }
}
