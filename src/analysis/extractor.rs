//! Failed Step Extraction
//!
//! Joins the failed rows reported by summary tables with the steps parsed
//! from the log body and picks the one the caller asked for.
//!
//! A nested workflow makes its caller's step fail as well, so the same
//! failure shows up twice: once in the child's own summary and once as the
//! parent's "run workflow" step. Only the child's step carries the useful
//! output, so a workflow's own failures are hidden when one of its child
//! workflows also failed. Sequential chains have no parent/child relation
//! and are never suppressed.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use super::markers::{split_lines, CHAIN_ARROW};
use super::model::{workflow_name, FailedStepRecord, Step, WorkflowStructure};
use super::parser::{parse_steps, ParsedLog};
use super::structure::detect_structure;
use super::summary::{scan_summaries, SummaryScan};

/// Outcome of asking for the Nth failed step of a log.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedStepSelection {
    /// Content served: the selected step, or the fallback summary
    pub content: String,

    /// Number of selectable failed steps
    pub total: usize,

    /// Display names of the selectable failed steps, in log order
    pub names: Vec<String>,

    /// Every failed row the summary tables report, as
    /// `"<step> (in <workflow>)"`, whether or not it resolved to a step
    pub reported: Vec<String>,

    /// 1-based index that was served, `None` when falling back
    pub selected: Option<usize>,
}

impl FailedStepSelection {
    fn fallback(content: String, names: Vec<String>, reported: Vec<String>) -> Self {
        Self {
            content,
            total: names.len(),
            names,
            reported,
            selected: None,
        }
    }

    /// True if a step (rather than the summary) is being served.
    pub fn is_step(&self) -> bool {
        self.selected.is_some()
    }

    /// True if any summary table reported a failed row.
    pub fn has_failures(&self) -> bool {
        !self.reported.is_empty()
    }

    /// Index to request next, if more failed steps remain.
    pub fn next_index(&self) -> Option<usize> {
        self.selected.filter(|&i| i < self.total).map(|i| i + 1)
    }
}

/// Returns the content of the `failed_step_index`-th (1-based) failed step.
///
/// Falls back to the final summary table (or the whole log if there is
/// none) when the build has no failures or the index is out of range.
pub fn extract_failed_step(log: &str, failed_step_index: usize) -> FailedStepSelection {
    let lines = split_lines(log);
    let structure = detect_structure(&lines);
    let scan = scan_summaries(&lines, &structure);
    let fallback = scan.final_text().unwrap_or(log).to_string();

    if !scan.has_failures() {
        info!("No failed rows in any summary");
        return FailedStepSelection::fallback(fallback, Vec::new(), Vec::new());
    }

    let reported: Vec<String> = scan.failed.iter().map(reported_name).collect();
    let parsed = parse_steps(&lines, &structure);
    let selectable = select_failed_steps(&parsed, &scan, &structure);
    let names: Vec<String> = selectable.iter().map(|step| step.display_name()).collect();

    if failed_step_index == 0 || failed_step_index > selectable.len() {
        warn!(
            "Requested failed step #{} but {} of {} failed rows are selectable",
            failed_step_index,
            selectable.len(),
            reported.len()
        );
        return FailedStepSelection::fallback(fallback, names, reported);
    }

    let step = selectable[failed_step_index - 1];
    info!(
        "Serving failed step #{} of {}: {}",
        failed_step_index,
        selectable.len(),
        step.display_name()
    );

    FailedStepSelection {
        content: step.content_text(),
        total: selectable.len(),
        names,
        reported,
        selected: Some(failed_step_index),
    }
}

/// Resolves failed rows to parsed steps and drops rolled-up parent failures.
///
/// The result keeps discovery order.
pub fn select_failed_steps<'a>(
    parsed: &'a ParsedLog,
    scan: &SummaryScan,
    structure: &WorkflowStructure,
) -> Vec<&'a Step> {
    let root_labels: HashSet<&str> = scan
        .sections
        .iter()
        .filter(|section| parsed.closes_root(section.start))
        .map(|section| section.workflow_label.as_str())
        .collect();

    let mut by_workflow: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut matched = HashSet::new();
    for record in &scan.failed {
        let is_root = root_labels.contains(record.workflow_label.as_str());
        for (idx, step) in parsed.steps.iter().enumerate() {
            if !step
                .title_with_sequence
                .to_lowercase()
                .eq(&record.step_name.to_lowercase())
            {
                continue;
            }
            if !workflow_matches(step, &record.workflow_label, is_root) {
                continue;
            }
            if matched.insert(idx) {
                by_workflow.entry(step.workflow.as_str()).or_default().push(idx);
            }
        }
    }

    let suppressed: HashSet<&str> = if structure.is_sequential_chain() {
        HashSet::new()
    } else {
        by_workflow
            .keys()
            .copied()
            .filter(|workflow| {
                parsed
                    .hierarchy
                    .children(workflow)
                    .iter()
                    .any(|child| by_workflow.contains_key(child.as_str()))
            })
            .collect()
    };

    for workflow in &suppressed {
        debug!("Suppressing failures of {}: a child workflow failed", workflow);
    }

    parsed
        .steps
        .iter()
        .enumerate()
        .filter(|(idx, step)| matched.contains(idx) && !suppressed.contains(step.workflow.as_str()))
        .map(|(_, step)| step)
        .collect()
}

/// Does a step belong to the workflow instance a failed row reports on?
///
/// A chain-level row may describe a step in any of the chain's workflows.
/// A table that closes the root instance reports on the steps that ran
/// outside any switched workflow.
fn workflow_matches(step: &Step, label: &str, closes_root: bool) -> bool {
    if label.contains(CHAIN_ARROW) {
        let links: Vec<&str> = workflow_name(label)
            .split(CHAIN_ARROW)
            .map(str::trim)
            .collect();
        return step.workflow == label || links.contains(&workflow_name(&step.workflow));
    }

    step.runs_under(label) || (closes_root && step.depth == 0)
}

/// `"Run Tests [1]"` in `"primary [1]"` reads as `"Run Tests (in primary)"`.
fn reported_name(record: &FailedStepRecord) -> String {
    format!(
        "{} (in {})",
        workflow_name(&record.step_name),
        workflow_name(&record.workflow_label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_X: &str = "\x1b[31;1mx\x1b[0m";
    const GREEN_OK: &str = "\x1b[32;1m✓\x1b[0m";

    fn summary(name: &str, rows: &[(&str, &str)]) -> String {
        let mut out = vec![
            "+-----------------------------+".to_string(),
            format!("| bitrise summary: {} |", name),
            "+---+-------------+-----------+".to_string(),
            "|   | title       | time (s)  |".to_string(),
            "+---+-------------+-----------+".to_string(),
        ];
        for (status, title) in rows {
            out.push(format!("| {} | {} | 1.0 sec |", status, title));
        }
        out.push("| Total runtime: 2.0 sec |".to_string());
        out.push("+-----------------------------+".to_string());
        out.join("\n")
    }

    #[test]
    fn test_zero_failures_serves_summary() {
        let table = summary("primary", &[(GREEN_OK, "Build")]);
        let log = format!("| (1) Build |\nok\n{}", table);

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.total, 0);
        assert!(!selection.is_step());
        assert_eq!(selection.content, table.split_once('\n').unwrap().1);
    }

    #[test]
    fn test_no_summary_returns_log() {
        let log = "| (1) Build |\nok";
        let selection = extract_failed_step(log, 1);
        assert_eq!(selection.content, log);
        assert_eq!(selection.total, 0);
    }

    #[test]
    fn test_single_failed_step() {
        let log = format!(
            "| (1) Git Clone |\ncloned\n| (2) Run Tests |\ntest a\ntest b FAILED\n{}",
            summary("primary", &[(GREEN_OK, "Git Clone"), (RED_X, "Run Tests (Failed)")])
        );

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.selected, Some(1));
        assert_eq!(selection.total, 1);
        assert_eq!(selection.names, vec!["Run Tests (in main)"]);
        assert!(selection.content.starts_with("| (2) Run Tests |\ntest a\ntest b FAILED"));
        assert!(!selection.content.contains("cloned"));
        assert_eq!(selection.next_index(), None);
    }

    #[test]
    fn test_out_of_range_index_serves_summary_with_names() {
        let log = format!(
            "| (1) Run Tests |\nboom\n{}",
            summary("primary", &[(RED_X, "Run Tests")])
        );

        let selection = extract_failed_step(&log, 3);
        assert!(!selection.is_step());
        assert_eq!(selection.total, 1);
        assert_eq!(selection.names, vec!["Run Tests (in main)"]);
        assert_eq!(selection.reported, vec!["Run Tests (in primary)"]);
        assert!(selection.content.contains("bitrise summary: primary"));
    }

    #[test]
    fn test_failed_row_without_matching_step_still_reported() {
        let log = format!(
            "| (1) Run Unit Tests v2 |\nboom\n{}",
            summary("primary", &[(RED_X, "Run Tests")])
        );

        let selection = extract_failed_step(&log, 1);
        assert!(!selection.is_step());
        assert_eq!(selection.total, 0);
        assert!(selection.has_failures());
        assert_eq!(selection.reported, vec!["Run Tests (in primary)"]);
        assert!(selection.content.contains("bitrise summary: primary"));
    }

    #[test]
    fn test_root_failure_next_to_nested_child() {
        let log = [
            "| (1) Run child |".to_string(),
            "Switching to workflow: child".to_string(),
            "| (1) Compile |".to_string(),
            "compiled".to_string(),
            summary("child", &[(GREEN_OK, "Compile")]),
            "| (2) Deploy |".to_string(),
            "deploy failed".to_string(),
            summary("primary", &[(GREEN_OK, "Run child"), (RED_X, "Deploy")]),
        ]
        .join("\n");

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.total, 1);
        assert_eq!(selection.names, vec!["Deploy (in main)"]);
        assert!(selection.content.starts_with("| (2) Deploy |\ndeploy failed"));
    }

    #[test]
    fn test_root_parent_suppressed_by_nested_child() {
        let log = [
            "| (1) Run child |".to_string(),
            "Switching to workflow: child".to_string(),
            "| (1) Compile |".to_string(),
            "error: missing symbol".to_string(),
            summary("child", &[(RED_X, "Compile")]),
            summary("primary", &[(RED_X, "Run child")]),
        ]
        .join("\n");

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.names, vec!["Compile (in child)"]);
        assert_eq!(selection.reported.len(), 2);
    }

    #[test]
    fn test_crlf_log() {
        let log = format!(
            "| (1) Run Tests |\r\nboom\r\n{}",
            summary("primary", &[(RED_X, "Run Tests")]).replace('\n', "\r\n")
        );

        let selection = extract_failed_step(&log, 1);
        assert!(selection.is_step());
        assert!(selection.content.starts_with("| (1) Run Tests |\nboom\n"));
        assert!(!selection.content.contains('\r'));
    }

    #[test]
    fn test_repeated_step_addressable_by_sequence() {
        let log = format!(
            "| (1) Build |\nfirst\n| (2) Build |\nsecond\n| (3) Build |\nthird\n{}",
            summary(
                "primary",
                &[(GREEN_OK, "Build"), (RED_X, "Build"), (GREEN_OK, "Build")]
            )
        );

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.total, 1);
        assert_eq!(selection.content, "| (2) Build |\nsecond");
    }

    #[test]
    fn test_chained_failures_are_independent() {
        let log = [
            "Running workflows: A → B".to_string(),
            "Switching to workflow: A".to_string(),
            "| (1) Lint |".to_string(),
            "lint error".to_string(),
            "Switching to workflow: B".to_string(),
            "| (2) Unit Test |".to_string(),
            "test error".to_string(),
            summary("A → B", &[(RED_X, "Lint"), (RED_X, "Unit Test")]),
        ]
        .join("\n");

        let first = extract_failed_step(&log, 1);
        assert_eq!(first.total, 2);
        assert_eq!(first.content, "| (1) Lint |\nlint error");
        assert_eq!(first.next_index(), Some(2));

        let second = extract_failed_step(&log, 2);
        assert!(second.content.starts_with("| (2) Unit Test |\ntest error"));
        assert_eq!(
            second.names,
            vec!["Lint (in A)", "Unit Test (in A → B)"]
        );
    }

    #[test]
    fn test_nested_parent_failure_suppressed() {
        let log = [
            "Switching to workflow: P".to_string(),
            "| (1) Prepare |".to_string(),
            "ready".to_string(),
            "| (2) Run C |".to_string(),
            "Switching to workflow: C".to_string(),
            "| (1) Compile |".to_string(),
            "error: missing symbol".to_string(),
            summary("C", &[(RED_X, "Compile")]),
            "| (3) Report |".to_string(),
            "reporting".to_string(),
            summary("P", &[(GREEN_OK, "Prepare"), (RED_X, "Run C"), (GREEN_OK, "Report")]),
        ]
        .join("\n");

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.total, 1);
        assert_eq!(selection.names, vec!["Compile (in C)"]);
        assert!(selection.content.starts_with("| (1) Compile |\nerror: missing symbol"));

        let beyond = extract_failed_step(&log, 2);
        assert!(!beyond.is_step());
        assert!(beyond.content.contains("bitrise summary: P"));
    }

    #[test]
    fn test_nested_sibling_without_child_failure_kept() {
        let log = [
            "Switching to workflow: P".to_string(),
            "| (1) Run C |".to_string(),
            "Switching to workflow: C".to_string(),
            "| (1) Compile |".to_string(),
            "ok".to_string(),
            summary("C", &[(GREEN_OK, "Compile")]),
            "| (2) Deploy |".to_string(),
            "deploy failed".to_string(),
            summary("P", &[(GREEN_OK, "Run C"), (RED_X, "Deploy")]),
        ]
        .join("\n");

        let selection = extract_failed_step(&log, 1);
        assert_eq!(selection.names, vec!["Deploy (in P)"]);
        assert!(selection.content.starts_with("| (2) Deploy |\ndeploy failed"));
    }

    #[test]
    fn test_index_zero_falls_back() {
        let log = format!(
            "| (1) Run Tests |\nboom\n{}",
            summary("primary", &[(RED_X, "Run Tests")])
        );
        let selection = extract_failed_step(&log, 0);
        assert!(!selection.is_step());
        assert_eq!(selection.total, 1);
    }

    #[test]
    fn test_case_insensitive_title_match() {
        let log = format!(
            "| (1) run tests |\nboom\n{}",
            summary("primary", &[(RED_X, "Run Tests")])
        );
        let selection = extract_failed_step(&log, 1);
        assert!(selection.is_step());
    }
}
