//! Build Log Analysis
//!
//! Pure, synchronous decomposition of a CI console log into workflows and
//! steps, plus the two views served from it.
//!
//! # Structure
//!
//! - [`markers`]: Literal marker vocabulary of the log format
//! - [`model`]: Core data structures (Step, WorkflowStructure, ...)
//! - [`structure`]: Chained / nested run detection
//! - [`parser`]: Workflow-stack step parser
//! - [`summary`]: Summary table scanner
//! - [`extractor`]: Failed step selection
//! - [`filter`]: Keyword + context filtering

pub mod extractor;
pub mod filter;
pub mod markers;
pub mod model;
pub mod parser;
pub mod structure;
pub mod summary;

pub use extractor::{extract_failed_step, select_failed_steps, FailedStepSelection};
pub use filter::{filter_log, filter_step_lines, FilterPatterns};
pub use model::{FailedStepRecord, Step, SummarySection, WorkflowHierarchy, WorkflowStructure};
pub use parser::{parse_steps, ParsedLog};
pub use structure::detect_structure;
pub use summary::{scan_summaries, SummaryScan};
