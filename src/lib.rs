//! StepLens - CI Build Log Narrowing
//!
//! Turns a multi-megabyte CI console log into the part worth reading:
//! the output of one failed step, optionally reduced further to keyword
//! hits with surrounding context.
//!
//! # Architecture
//!
//! The library is organized into four modules:
//!
//! - [`analysis`]: Pure log decomposition (structure, steps, summaries,
//!   failed step selection, keyword filtering)
//! - [`response`]: Build log API envelope handling and the async facade
//! - [`config`]: Processing options and filter pattern files
//! - [`error`]: Error types for the I/O edges
//!
//! # Example
//!
//! ```rust,no_run
//! use steplens::config::ProcessOptions;
//! use steplens::response::{process_build_log, HttpLogFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let payload = std::fs::read_to_string("build-log.json")?;
//!     let options = ProcessOptions::new().with_failed_step(1);
//!
//!     let fetcher = HttpLogFetcher::new()?;
//!     let output = process_build_log(&payload, &options, &fetcher).await;
//!     println!("{}", output);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod response;

// Re-export commonly used types
pub use analysis::{extract_failed_step, filter_log, FailedStepSelection, FilterPatterns};
pub use config::{load_filter_patterns, BuildRef, ProcessOptions};
pub use error::{LogError, Result};
pub use response::{process_build_log, HttpLogFetcher, LogFetcher, NoFetch};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "StepLens";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "StepLens");
    }

    #[test]
    fn test_module_exports_extract() {
        let selection = extract_failed_step("plain text", 1);
        assert_eq!(selection.total, 0);
        assert_eq!(selection.content, "plain text");
    }

    #[test]
    fn test_module_exports_options() {
        let options = ProcessOptions::new();
        assert!(!options.is_active());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
