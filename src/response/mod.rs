//! Build Log Responses
//!
//! The I/O side of the crate: reading the build log API envelope,
//! downloading the complete log and writing the processed result back.
//!
//! - [`envelope`]: Response document access and rewriting
//! - [`fetch`]: Complete log download
//! - [`processor`]: The `process_build_log` facade

pub mod envelope;
pub mod fetch;
pub mod processor;

pub use envelope::{LogEnvelope, ServedNote};
pub use fetch::{HttpLogFetcher, LogFetcher, NoFetch};
pub use processor::{process_build_log, process_log_text, ProcessedLog};
