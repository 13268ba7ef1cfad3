//! Build Log Response Envelope
//!
//! The JSON document returned by the build log API. Only a few fields
//! matter here; everything else is carried through untouched and in its
//! original order.
//!
//! ```json
//! {
//!   "expiring_raw_log_url": "https://...",
//!   "is_archived": true,
//!   "log_chunks": [{"chunk": "...", "position": 0}, ...]
//! }
//! ```

use serde_json::{json, Map, Value};

use crate::analysis::FailedStepSelection;
use crate::config::ProcessOptions;
use crate::error::Result;

/// Temporary URL of the complete raw log.
pub const RAW_LOG_URL_FIELD: &str = "expiring_raw_log_url";

/// Ordered list of `{"chunk": ..., "position": ...}` objects.
pub const LOG_CHUNKS_FIELD: &str = "log_chunks";

/// Human-readable description of what is being served.
pub const NOTE_FIELD: &str = "note";

/// Suggested follow-up call when more failed steps remain.
pub const NEXT_COMMAND_FIELD: &str = "next_command";

/// A parsed build log response.
#[derive(Debug, Clone)]
pub struct LogEnvelope {
    fields: Map<String, Value>,
}

impl LogEnvelope {
    /// Parses a payload; anything but a JSON object yields `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(Value::Object(fields)) => Some(Self { fields }),
            _ => None,
        }
    }

    /// The complete log URL, if present and non-empty.
    pub fn raw_log_url(&self) -> Option<&str> {
        self.fields
            .get(RAW_LOG_URL_FIELD)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// The served note of an already processed response.
    pub fn note(&self) -> Option<&str> {
        self.fields.get(NOTE_FIELD).and_then(Value::as_str)
    }

    /// The follow-up hint of an already processed response.
    pub fn next_command(&self) -> Option<&str> {
        self.fields.get(NEXT_COMMAND_FIELD).and_then(Value::as_str)
    }

    /// Concatenated text of all log chunks, in order.
    pub fn chunk_text(&self) -> String {
        self.fields
            .get(LOG_CHUNKS_FIELD)
            .and_then(Value::as_array)
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| chunk.get("chunk").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serializes the envelope with the processed log in place of the
    /// original chunks.
    ///
    /// The note goes first; the raw log URL is nulled since the content
    /// has been materialized.
    pub fn rewrite(self, content: String, note: &ServedNote) -> Result<String> {
        let mut fields = Map::new();
        fields.insert(NOTE_FIELD.to_string(), Value::String(note.note.clone()));
        if let Some(command) = &note.next_command {
            fields.insert(NEXT_COMMAND_FIELD.to_string(), Value::String(command.clone()));
        }

        for (key, value) in self.fields {
            if key == NOTE_FIELD || key == NEXT_COMMAND_FIELD {
                continue;
            }
            fields.insert(key, value);
        }

        fields.insert(
            LOG_CHUNKS_FIELD.to_string(),
            json!([{ "chunk": content, "position": 0 }]),
        );
        if let Some(url) = fields.get_mut(RAW_LOG_URL_FIELD) {
            *url = Value::Null;
        }

        Ok(serde_json::to_string(&Value::Object(fields))?)
    }
}

/// The `note` (and optional `next_command`) injected into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedNote {
    pub note: String,
    pub next_command: Option<String>,
}

impl ServedNote {
    /// Describes what a processing run served.
    pub fn describe(options: &ProcessOptions, selection: Option<&FailedStepSelection>) -> Self {
        let next_command = None;

        if options.failed_step_only {
            let Some(selection) = selection.filter(|s| s.has_failures()) else {
                return Self {
                    note: "No failed steps found. Showing build summary instead.".to_string(),
                    next_command,
                };
            };
            return Self::describe_selection(options, selection);
        }

        let note = if options.enable_filtering {
            "Logs filtered using keyword patterns"
        } else {
            "Log processing completed"
        };
        Self {
            note: note.to_string(),
            next_command,
        }
    }

    fn describe_selection(options: &ProcessOptions, selection: &FailedStepSelection) -> Self {
        let Some(index) = selection.selected else {
            let reported = selection.reported.len();
            return Self {
                note: format!(
                    "Requested failed step #{} but only {} failed steps exist. \
                     Showing build summary instead. All failed steps: {}. \
                     Use failed_step_index=1 to {} to see specific failed steps.",
                    options.failed_step_index,
                    reported,
                    selection.reported.join(", "),
                    reported
                ),
                next_command: None,
            };
        };

        let total = selection.total;
        let names = selection.names.join(", ");

        if total == 1 {
            return Self {
                note: format!("Showing the only failed step (step #{})", index),
                next_command: None,
            };
        }

        let mut note = format!(
            "Showing failed step #{} of {}. Total failed steps: {}.",
            index, total, names
        );
        let next_command = selection.next_index().and_then(|next| {
            note.push_str(&format!(
                " Use failed_step_index={} for next failed step.",
                next
            ));
            options.build.as_ref().map(|build| {
                format!(
                    "get_build_log('{}', '{}', {})",
                    build.app_slug, build.build_slug, next
                )
            })
        });

        Self { note, next_command }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildRef;

    fn selection(total: usize, selected: Option<usize>) -> FailedStepSelection {
        let names: Vec<String> = (1..=total).map(|i| format!("Step {} (in main)", i)).collect();
        FailedStepSelection {
            content: String::new(),
            total,
            reported: names.clone(),
            names,
            selected,
        }
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(LogEnvelope::parse("not json").is_none());
        assert!(LogEnvelope::parse("[1, 2]").is_none());
        assert!(LogEnvelope::parse("{}").is_some());
    }

    #[test]
    fn test_raw_log_url() {
        let envelope = LogEnvelope::parse(r#"{"expiring_raw_log_url": "https://x/log"}"#).unwrap();
        assert_eq!(envelope.raw_log_url(), Some("https://x/log"));

        let empty = LogEnvelope::parse(r#"{"expiring_raw_log_url": ""}"#).unwrap();
        assert_eq!(empty.raw_log_url(), None);

        let null = LogEnvelope::parse(r#"{"expiring_raw_log_url": null}"#).unwrap();
        assert_eq!(null.raw_log_url(), None);
    }

    #[test]
    fn test_chunk_text_concatenates() {
        let envelope = LogEnvelope::parse(
            r#"{"log_chunks": [{"chunk": "a\nb", "position": 0}, {"position": 1}, {"chunk": "\nc", "position": 2}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.chunk_text(), "a\nb\nc");
        assert_eq!(LogEnvelope::parse("{}").unwrap().chunk_text(), "");
    }

    #[test]
    fn test_rewrite_layout() {
        let envelope = LogEnvelope::parse(
            r#"{"is_archived": true, "expiring_raw_log_url": "https://x", "log_chunks": [{"chunk": "old"}], "timestamp": null}"#,
        )
        .unwrap();
        let note = ServedNote {
            note: "hello".to_string(),
            next_command: Some("next".to_string()),
        };

        let output = envelope.rewrite("new text".to_string(), &note).unwrap();
        let reparsed = LogEnvelope::parse(&output).unwrap();
        assert_eq!(reparsed.note(), Some("hello"));
        assert_eq!(reparsed.next_command(), Some("next"));
        assert_eq!(
            output,
            r#"{"note":"hello","next_command":"next","is_archived":true,"expiring_raw_log_url":null,"log_chunks":[{"chunk":"new text","position":0}],"timestamp":null}"#
        );
    }

    #[test]
    fn test_rewrite_without_url_field() {
        let envelope = LogEnvelope::parse(r#"{"log_chunks": []}"#).unwrap();
        let note = ServedNote {
            note: "n".to_string(),
            next_command: None,
        };
        let value: Value = serde_json::from_str(&envelope.rewrite("x".into(), &note).unwrap()).unwrap();
        assert!(value.get(RAW_LOG_URL_FIELD).is_none());
        assert!(value.get(NEXT_COMMAND_FIELD).is_none());
        assert_eq!(value[LOG_CHUNKS_FIELD][0]["chunk"], "x");
    }

    #[test]
    fn test_note_only_failed_step() {
        let options = ProcessOptions::new().with_failed_step(1);
        let note = ServedNote::describe(&options, Some(&selection(1, Some(1))));
        assert_eq!(note.note, "Showing the only failed step (step #1)");
        assert!(note.next_command.is_none());
    }

    #[test]
    fn test_note_several_failed_steps_with_next_command() {
        let options = ProcessOptions::new()
            .with_failed_step(1)
            .with_build(BuildRef::new("app-1", "build-9"));
        let note = ServedNote::describe(&options, Some(&selection(3, Some(1))));

        assert_eq!(
            note.note,
            "Showing failed step #1 of 3. Total failed steps: Step 1 (in main), Step 2 (in main), \
             Step 3 (in main). Use failed_step_index=2 for next failed step."
        );
        assert_eq!(
            note.next_command.as_deref(),
            Some("get_build_log('app-1', 'build-9', 2)")
        );
    }

    #[test]
    fn test_note_last_failed_step_has_no_next() {
        let options = ProcessOptions::new()
            .with_failed_step(2)
            .with_build(BuildRef::new("a", "b"));
        let note = ServedNote::describe(&options, Some(&selection(2, Some(2))));
        assert!(!note.note.contains("for next failed step"));
        assert!(note.next_command.is_none());
    }

    #[test]
    fn test_note_without_build_has_no_command() {
        let options = ProcessOptions::new().with_failed_step(1);
        let note = ServedNote::describe(&options, Some(&selection(2, Some(1))));
        assert!(note.note.contains("failed_step_index=2"));
        assert!(note.next_command.is_none());
    }

    #[test]
    fn test_note_out_of_range() {
        let options = ProcessOptions::new().with_failed_step(5);
        let note = ServedNote::describe(&options, Some(&selection(2, None)));
        assert_eq!(
            note.note,
            "Requested failed step #5 but only 2 failed steps exist. Showing build summary \
             instead. All failed steps: Step 1 (in main), Step 2 (in main). Use \
             failed_step_index=1 to 2 to see specific failed steps."
        );
    }

    #[test]
    fn test_note_reports_rows_that_matched_no_step() {
        let options = ProcessOptions::new().with_failed_step(1);
        let mut unmatched = selection(0, None);
        unmatched.reported = vec!["Run Tests (in primary)".to_string()];

        let note = ServedNote::describe(&options, Some(&unmatched));
        assert_eq!(
            note.note,
            "Requested failed step #1 but only 1 failed steps exist. Showing build summary \
             instead. All failed steps: Run Tests (in primary). Use failed_step_index=1 to 1 \
             to see specific failed steps."
        );
    }

    #[test]
    fn test_note_no_failures() {
        let options = ProcessOptions::new().with_failed_step(1);
        let note = ServedNote::describe(&options, Some(&selection(0, None)));
        assert_eq!(note.note, "No failed steps found. Showing build summary instead.");
    }

    #[test]
    fn test_note_filtering_only() {
        let options = ProcessOptions::new().with_filter(Default::default());
        let note = ServedNote::describe(&options, None);
        assert_eq!(note.note, "Logs filtered using keyword patterns");
    }
}
