//! Summary Table Scanner
//!
//! Every workflow run ends with a bordered summary table listing each step
//! and its status. This module locates those tables, assigns each one the
//! workflow instance it reports on and collects the failed rows.
//!
//! # Example Table
//!
//! ```text
//! +------------------------------------------------------+
//! |               bitrise summary: primary               |
//! +---+--------------------------------------+-----------+
//! |   | title                                | time (s)  |
//! +---+--------------------------------------+-----------+
//! | ✓ | Git Clone                            | 2.1 sec   |
//! | x | Run Tests (Failed)                   | 40 sec    |
//! +---+--------------------------------------+-----------+
//! | Total runtime: 42.1 sec                              |
//! +------------------------------------------------------+
//! ```
//!
//! Labels follow the same `"<name> [<k>]"` scheme the step parser uses, so
//! failed rows can be joined with parsed steps on identical strings.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use super::markers::{
    clean_step_name, is_border, is_summary_line, summary_workflow, FAILED_SUFFIX, FAILURE_COLOR,
    SUMMARY_MARKER, TOTAL_RUNTIME_MARKER,
};
use super::model::{instance_label, FailedStepRecord, SummarySection, WorkflowStructure};

/// Result of scanning all summary tables of a log.
#[derive(Debug, Clone, Default)]
pub struct SummaryScan {
    /// Summary blocks in log order
    pub sections: Vec<SummarySection>,

    /// Deduplicated failed rows in log order
    pub failed: Vec<FailedStepRecord>,
}

impl SummaryScan {
    /// Text of the last summary block, used when no step can be shown.
    pub fn final_text(&self) -> Option<&str> {
        self.sections.last().map(|section| section.text.as_str())
    }

    /// True if any summary row reported a failure.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Finds every summary table, labels it and extracts its failed rows.
pub fn scan_summaries<S: AsRef<str>>(lines: &[S], structure: &WorkflowStructure) -> SummaryScan {
    let blocks = locate_blocks(lines);
    let sections = label_blocks(lines, blocks, structure);

    let mut failed = Vec::new();
    let mut seen = HashSet::new();
    for section in &sections {
        for step_name in failed_rows(&lines[section.start..=section.end]) {
            let record = FailedStepRecord::new(step_name, section.workflow_label.clone());
            if seen.insert(record.clone()) {
                debug!(
                    "Failed row '{}' in {}",
                    record.step_name, record.workflow_label
                );
                failed.push(record);
            }
        }
    }

    info!(
        "Found {} summary blocks with {} failed rows",
        sections.len(),
        failed.len()
    );

    SummaryScan { sections, failed }
}

/// Returns `(start, end, workflow name)` for every summary block.
///
/// A block ends at the border following its `Total runtime:` row, right
/// before the next summary header, or at the end of the log.
fn locate_blocks<S: AsRef<str>>(lines: &[S]) -> Vec<(usize, usize, String)> {
    let last = lines.len().saturating_sub(1);
    let mut blocks = Vec::new();

    for (start, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if !is_summary_line(line) {
            continue;
        }
        let Some(name) = summary_workflow(line) else {
            continue;
        };

        let mut end = None;
        for (offset, candidate) in lines[start + 1..].iter().enumerate() {
            let j = start + 1 + offset;
            let candidate = candidate.as_ref();

            if candidate.contains(TOTAL_RUNTIME_MARKER) {
                end = lines[j + 1..]
                    .iter()
                    .position(|l| is_border(l.as_ref()))
                    .map(|pos| j + 1 + pos);
                break;
            }
            if candidate.contains(SUMMARY_MARKER) {
                end = Some(j - 1);
                break;
            }
        }

        blocks.push((start, end.unwrap_or(last), name));
    }

    blocks
}

/// Assigns workflow instance labels to located blocks.
///
/// The last block of a chained run reports on the whole chain; every other
/// block counts executions per workflow name.
fn label_blocks<S: AsRef<str>>(
    lines: &[S],
    blocks: Vec<(usize, usize, String)>,
    structure: &WorkflowStructure,
) -> Vec<SummarySection> {
    let total = blocks.len();
    let mut executions: HashMap<String, usize> = HashMap::new();

    blocks
        .into_iter()
        .enumerate()
        .map(|(idx, (start, end, name))| {
            let is_final = idx + 1 == total;
            let workflow_label = match (&structure.chained_instance_label, structure.is_chained) {
                (Some(chain_label), true) if is_final => chain_label.clone(),
                _ => {
                    let count = executions.entry(name.clone()).or_insert(0);
                    *count += 1;
                    instance_label(&name, *count)
                }
            };

            let text = lines[start..=end]
                .iter()
                .map(|l| l.as_ref())
                .collect::<Vec<_>>()
                .join("\n");

            SummarySection {
                start,
                end,
                workflow_label,
                text,
            }
        })
        .collect()
}

/// Returns the sequenced names of failed rows within one block.
fn failed_rows<S: AsRef<str>>(block: &[S]) -> Vec<String> {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut failed = Vec::new();

    for line in block {
        let line = line.as_ref();
        if is_border(line) || is_summary_line(line) {
            continue;
        }
        if !line.starts_with('|') || line.matches('|').count() < 3 {
            continue;
        }

        let cells: Vec<&str> = line.split('|').map(str::trim).collect();
        if cells.len() < 4 {
            continue;
        }
        let (status, title) = (cells[1], cells[2]);

        let name = clean_step_name(title);
        if name.is_empty() || name.eq_ignore_ascii_case("title") {
            continue;
        }

        let seen = occurrences.entry(name.clone()).or_insert(0);
        *seen += 1;

        if status.contains(FAILURE_COLOR) || title.contains(FAILED_SUFFIX) {
            failed.push(instance_label(&name, *seen));
        }
    }

    failed
}
