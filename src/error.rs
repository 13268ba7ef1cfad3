//! Error Types
//!
//! Errors raised at the edges of the crate: downloading the complete log,
//! reading input files and decoding payloads. The analysis pipeline itself
//! is infallible and never produces these.

use thiserror::Error;

/// Errors produced while obtaining or decoding build log input.
#[derive(Debug, Error)]
pub enum LogError {
    /// Transport-level failure while downloading the complete log
    #[error("failed to download complete log: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The log URL answered with something other than 200 OK
    #[error("complete log URL returned HTTP {0}")]
    FetchStatus(u16),

    /// Downloading was switched off for this run
    #[error("complete log download disabled")]
    Offline,

    /// Reading an input or pattern file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response payload is not valid JSON
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The filter pattern file is not a valid mapping
    #[error("invalid filter patterns: {0}")]
    Patterns(#[from] serde_yaml::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogError>;
