//! Build Log Processing Facade
//!
//! Takes a build log API response, narrows and/or filters its log text
//! according to [`ProcessOptions`], and hands back the same response with
//! the processed text in place. Nothing here fails: every problem degrades
//! to a less processed but still valid response.

use log::{debug, info, warn};

use crate::analysis::{extract_failed_step, filter_log, FailedStepSelection};
use crate::config::ProcessOptions;

use super::envelope::{LogEnvelope, ServedNote};
use super::fetch::LogFetcher;

/// Log text after the enabled stages ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedLog {
    /// Text to serve
    pub content: String,

    /// Failed step lookup result, when narrowing was requested
    pub selection: Option<FailedStepSelection>,
}

impl ProcessedLog {
    /// The note describing what is being served.
    pub fn note(&self, options: &ProcessOptions) -> ServedNote {
        ServedNote::describe(options, self.selection.as_ref())
    }
}

/// Runs the enabled stages over plain log text.
///
/// Narrowing comes first; filtering then applies to the selected step only.
/// A summary fallback is never filtered.
pub fn process_log_text(log: &str, options: &ProcessOptions) -> ProcessedLog {
    let mut content = log.to_string();
    let mut selection = None;
    let mut filterable = true;

    if options.failed_step_only {
        let selected = extract_failed_step(log, options.failed_step_index);
        filterable = selected.is_step();
        content = selected.content.clone();
        selection = Some(selected);
    }

    if options.enable_filtering {
        if filterable {
            content = filter_log(&content, &options.filter_patterns, options.context_lines);
        } else {
            debug!("Serving build summary, skipping keyword filtering");
        }
    }

    ProcessedLog { content, selection }
}

/// Processes a build log API response.
///
/// With neither stage enabled the payload is returned as is. Payloads that
/// are not JSON objects, or carry no log text at all, are also returned
/// unchanged.
pub async fn process_build_log<F>(payload: &str, options: &ProcessOptions, fetcher: &F) -> String
where
    F: LogFetcher + ?Sized,
{
    if !options.is_active() {
        return payload.to_string();
    }

    let Some(envelope) = LogEnvelope::parse(payload) else {
        warn!("Response is not a JSON object, passing it through");
        return payload.to_string();
    };

    let log = obtain_log_text(&envelope, options, fetcher).await;
    if log.is_empty() {
        info!("Response carries no log content");
        return payload.to_string();
    }

    let processed = process_log_text(&log, options);
    let note = processed.note(options);
    info!("{}", note.note);

    match envelope.rewrite(processed.content, &note) {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to serialize processed response: {}", e);
            payload.to_string()
        }
    }
}

/// Prefers the complete log; falls back to the chunked copy in the payload.
async fn obtain_log_text<F>(envelope: &LogEnvelope, options: &ProcessOptions, fetcher: &F) -> String
where
    F: LogFetcher + ?Sized,
{
    if let Some(url) = envelope.raw_log_url() {
        match tokio::time::timeout(options.fetch_timeout, fetcher.fetch(url)).await {
            Ok(Ok(text)) => {
                info!("Using complete log ({} bytes)", text.len());
                return text;
            }
            Ok(Err(e)) => warn!("Falling back to log chunks: {}", e),
            Err(_) => warn!(
                "Falling back to log chunks: download timed out after {:?}",
                options.fetch_timeout
            ),
        }
    }

    envelope.chunk_text()
}
