//! Keyword Content Filter
//!
//! Narrows each step's output to the lines around interesting keywords.
//! Which keywords apply is decided by the step's title: a pattern map
//! associates a step-type substring (e.g. `"gradle"`) with the keywords
//! worth keeping for that kind of step (e.g. `["error", "FAILURE"]`).
//!
//! # Example Pattern File
//!
//! ```yaml
//! xcode: [error, "** BUILD FAILED **"]
//! gradle:
//!   - FAILURE
//!   - "What went wrong"
//! test: ERROR
//! ```

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use super::markers::split_lines;
use super::parser::parse_steps;
use super::structure::detect_structure;

/// Leading lines of a step inspected for structural content.
const HEADER_SCAN_LINES: usize = 10;

/// Lines kept from a filtered step when no keyword matched.
const PLACEHOLDER_LINES: usize = 5;

/// Substrings that mark step metadata lines worth keeping.
const METADATA_MARKERS: &[&str] = &["id:", "version:", "collection:", "toolkit:"];

/// Ordered step-type → keywords rules. The first rule whose step type
/// occurs in a step title applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatterns {
    rules: Vec<(String, Vec<String>)>,
}

impl FilterPatterns {
    /// Creates an empty pattern set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    pub fn with_rule<I, S>(mut self, step_type: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .push((step_type.into(), keywords.into_iter().map(Into::into).collect()));
        self
    }

    /// Keywords for the first rule matching `title` (case-insensitive).
    pub fn keywords_for(&self, title: &str) -> Option<&[String]> {
        let title = title.to_lowercase();
        self.iter()
            .find(|(step_type, _)| title.contains(&step_type.to_lowercase()))
            .map(|(_, keywords)| keywords)
    }

    /// Iterates rules in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rules
            .iter()
            .map(|(step_type, keywords)| (step_type.as_str(), keywords.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Vec<V>)> for FilterPatterns {
    fn from_iter<T: IntoIterator<Item = (K, Vec<V>)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |patterns, (step_type, keywords)| {
                patterns.with_rule(step_type, keywords)
            })
    }
}

/// A keyword list written either as a single string or a sequence.
#[derive(Deserialize)]
#[serde(untagged)]
enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl From<Keywords> for Vec<String> {
    fn from(keywords: Keywords) -> Self {
        match keywords {
            Keywords::One(keyword) if keyword.is_empty() => Vec::new(),
            Keywords::One(keyword) => vec![keyword],
            Keywords::Many(keywords) => keywords,
        }
    }
}

struct PatternsVisitor;

impl<'de> Visitor<'de> for PatternsVisitor {
    type Value = FilterPatterns;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of step type to keyword list")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FilterPatterns::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut patterns = FilterPatterns::new();
        while let Some((step_type, keywords)) = map.next_entry::<String, Keywords>()? {
            patterns = patterns.with_rule(step_type, Vec::<String>::from(keywords));
        }
        Ok(patterns)
    }
}

// Deserialized through a visitor so rules keep document order.
impl<'de> Deserialize<'de> for FilterPatterns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PatternsVisitor)
    }
}

/// Filters every step of a log by its matching keyword rule.
///
/// Steps with no matching rule are kept whole. Steps are separated by one
/// blank line; lines before the first step header are dropped. Filtering
/// already-filtered output with the same parameters returns it unchanged.
pub fn filter_log(log: &str, patterns: &FilterPatterns, context_lines: usize) -> String {
    if patterns.is_empty() {
        debug!("No filter rules, keeping log as is");
        return log.to_string();
    }

    let lines = split_lines(log);
    let structure = detect_structure(&lines);
    let parsed = parse_steps(&lines, &structure);

    let mut output: Vec<&str> = Vec::new();
    let mut filtered_steps = 0;
    for step in &parsed.steps {
        let kept = match patterns.keywords_for(&step.title) {
            Some(keywords) => {
                filtered_steps += 1;
                filter_step_lines(&step.content, keywords, context_lines)
            }
            None => step.content.iter().map(String::as_str).collect(),
        };

        let end = kept
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |pos| pos + 1);
        output.extend_from_slice(&kept[..end]);
        output.push("");
    }

    info!(
        "Filtered {} of {} steps ({} -> {} lines)",
        filtered_steps,
        parsed.steps.len(),
        lines.len(),
        output.len()
    );

    output.join("\n")
}

/// Keeps keyword hits with `context_lines` of context on each side, plus
/// structural lines near the top of the step.
///
/// If nothing at all is kept, the first few lines stand in for the step.
pub fn filter_step_lines<'a, S: AsRef<str>>(
    lines: &'a [S],
    keywords: &[String],
    context_lines: usize,
) -> Vec<&'a str> {
    let all = || lines.iter().map(|line| line.as_ref()).collect::<Vec<_>>();
    if keywords.is_empty() {
        return all();
    }

    let mut included = BTreeSet::new();

    for (idx, line) in lines.iter().take(HEADER_SCAN_LINES).enumerate() {
        if is_structural(line.as_ref()) {
            included.insert(idx);
        }
    }

    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    for (idx, line) in lines.iter().enumerate() {
        let lowered = line.as_ref().to_lowercase();
        if keywords.iter().any(|keyword| lowered.contains(keyword.as_str())) {
            let from = idx.saturating_sub(context_lines);
            let to = (idx + context_lines).min(lines.len() - 1);
            included.extend(from..=to);
        }
    }

    if included.is_empty() {
        debug!("No keyword hits; keeping first {} lines", PLACEHOLDER_LINES);
        return lines
            .iter()
            .take(PLACEHOLDER_LINES)
            .map(|line| line.as_ref())
            .collect();
    }

    included.into_iter().map(|idx| lines[idx].as_ref()).collect()
}

/// Table borders, step boxes and step metadata.
fn is_structural(line: &str) -> bool {
    line.starts_with('|')
        || line.starts_with('+')
        || METADATA_MARKERS.iter().any(|marker| line.contains(marker))
}
