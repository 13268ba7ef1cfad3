//! Processing Options
//!
//! Everything a single `process_build_log` call needs to know, passed
//! explicitly rather than read from globals, plus loading of keyword
//! pattern files.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use crate::analysis::FilterPatterns;
use crate::error::Result;

/// Default number of context lines kept around a keyword hit.
pub const DEFAULT_CONTEXT_LINES: usize = 5;

/// Default timeout for downloading the complete log.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies the build a log belongs to, for follow-up hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRef {
    pub app_slug: String,
    pub build_slug: String,
}

impl BuildRef {
    pub fn new(app_slug: impl Into<String>, build_slug: impl Into<String>) -> Self {
        Self {
            app_slug: app_slug.into(),
            build_slug: build_slug.into(),
        }
    }
}

/// Options controlling how a build log response is processed.
///
/// # Example
///
/// ```
/// use steplens::config::ProcessOptions;
/// use steplens::analysis::FilterPatterns;
///
/// let options = ProcessOptions::new()
///     .with_failed_step(2)
///     .with_filter(FilterPatterns::new().with_rule("gradle", ["error"]))
///     .with_context_lines(3);
///
/// assert!(options.failed_step_only);
/// assert!(options.enable_filtering);
/// ```
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Serve only one failed step instead of the whole log
    pub failed_step_only: bool,

    /// Which failed step to serve (1-based)
    pub failed_step_index: usize,

    /// Apply keyword filtering
    pub enable_filtering: bool,

    /// Step-type → keyword rules used when filtering
    pub filter_patterns: FilterPatterns,

    /// Lines kept on each side of a keyword hit
    pub context_lines: usize,

    /// Build identity used for the `next_command` hint
    pub build: Option<BuildRef>,

    /// Upper bound for downloading the complete log
    pub fetch_timeout: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            failed_step_only: false,
            failed_step_index: 1,
            enable_filtering: false,
            filter_patterns: FilterPatterns::new(),
            context_lines: DEFAULT_CONTEXT_LINES,
            build: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl ProcessOptions {
    /// Options that pass the log through untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves only the `index`-th failed step (indices below 1 mean 1).
    pub fn with_failed_step(mut self, index: usize) -> Self {
        self.failed_step_only = true;
        self.failed_step_index = index.max(1);
        self
    }

    /// Enables keyword filtering with the given rules.
    pub fn with_filter(mut self, patterns: FilterPatterns) -> Self {
        self.enable_filtering = true;
        self.filter_patterns = patterns;
        self
    }

    /// Sets the context radius around keyword hits.
    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Attaches the build identity for follow-up hints.
    pub fn with_build(mut self, build: BuildRef) -> Self {
        self.build = Some(build);
        self
    }

    /// Sets the complete-log download timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// True if any processing stage is enabled.
    pub fn is_active(&self) -> bool {
        self.failed_step_only || self.enable_filtering
    }
}

/// Loads step-type → keyword rules from a YAML or JSON file.
///
/// Rules keep the order they appear in the file.
pub fn load_filter_patterns(path: impl AsRef<Path>) -> Result<FilterPatterns> {
    let path = path.as_ref();
    info!("Loading filter patterns from: {}", path.display());

    let content = fs::read_to_string(path)?;
    debug!("Pattern file loaded ({} bytes)", content.len());

    let patterns: FilterPatterns = serde_yaml::from_str(&content)?;
    info!("Loaded {} filter rules", patterns.len());

    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_options_are_inactive() {
        let options = ProcessOptions::default();
        assert!(!options.is_active());
        assert_eq!(options.failed_step_index, 1);
        assert_eq!(options.context_lines, DEFAULT_CONTEXT_LINES);
        assert_eq!(options.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_failed_step_index_is_one_based() {
        let options = ProcessOptions::new().with_failed_step(0);
        assert!(options.failed_step_only);
        assert_eq!(options.failed_step_index, 1);
    }

    #[test]
    fn test_builder_chain() {
        let options = ProcessOptions::new()
            .with_filter(FilterPatterns::new().with_rule("xcode", ["error"]))
            .with_context_lines(2)
            .with_build(BuildRef::new("app", "build"))
            .with_fetch_timeout(Duration::from_secs(5));

        assert!(options.is_active());
        assert!(!options.failed_step_only);
        assert_eq!(options.filter_patterns.len(), 1);
        assert_eq!(options.context_lines, 2);
        assert_eq!(options.build, Some(BuildRef::new("app", "build")));
        assert_eq!(options.fetch_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_yaml_patterns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.yaml");
        fs::write(&path, "gradle:\n  - FAILURE\n  - error\nxcode: \"** BUILD FAILED **\"\n").unwrap();

        let patterns = load_filter_patterns(&path).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(
            patterns.keywords_for("Gradle Runner"),
            Some(&["FAILURE".to_string(), "error".to_string()][..])
        );
    }

    #[test]
    fn test_load_json_patterns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        fs::write(&path, r#"{"test": ["ERROR", "FAIL"]}"#).unwrap();

        let patterns = load_filter_patterns(&path).unwrap();
        assert_eq!(patterns.keywords_for("Run Tests").map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_filter_patterns("/nonexistent/patterns.yaml").is_err());
    }

    #[test]
    fn test_load_invalid_patterns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "- just\n- a list\n").unwrap();

        let err = load_filter_patterns(&path).unwrap_err();
        assert!(err.to_string().starts_with("invalid filter patterns"));
    }
}
