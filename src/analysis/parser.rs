//! Step Parser
//!
//! Walks the log line by line and splits it into steps, tracking which
//! workflow instance each step ran in.
//!
//! The scan keeps an explicit stack of workflow instance labels seeded with
//! the implicit root. A switch marker pushes a new instance, a summary
//! marker pops back to the caller, and a step header closes the open step
//! and opens the next one.
//!
//! Lines before the first step header are not part of any step; switch and
//! summary marker lines are consumed by the state machine and never appear
//! in step content.

use std::collections::HashMap;

use log::{debug, info};

use super::markers::{is_step_header, is_summary_line, step_header, switched_workflow};
use super::model::{instance_label, root_label, workflow_name, Step, WorkflowHierarchy, WorkflowStructure};

/// Steps in discovery order plus the workflow hierarchy they ran in.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub steps: Vec<Step>,
    pub hierarchy: WorkflowHierarchy,

    /// Line indices of summary markers seen while only the root instance
    /// was open. Those tables report on the root's own steps.
    pub root_summaries: Vec<usize>,
}

impl ParsedLog {
    /// True if the summary table starting at `line` closes the root instance.
    pub fn closes_root(&self, line: usize) -> bool {
        self.root_summaries.contains(&line)
    }
}

/// Scanner state for one pass over a log.
struct StepParser<'a> {
    structure: &'a WorkflowStructure,
    stack: Vec<String>,
    executions: HashMap<String, usize>,
    occurrences: HashMap<String, HashMap<String, usize>>,
    hierarchy: WorkflowHierarchy,
    steps: Vec<Step>,
    current: Option<Step>,
    root_summaries: Vec<usize>,
}

impl<'a> StepParser<'a> {
    fn new(structure: &'a WorkflowStructure) -> Self {
        Self {
            structure,
            stack: vec![root_label()],
            executions: HashMap::new(),
            occurrences: HashMap::new(),
            hierarchy: WorkflowHierarchy::new(),
            steps: Vec::new(),
            current: None,
            root_summaries: Vec::new(),
        }
    }

    fn top(&self) -> &str {
        // The root is never popped.
        self.stack.last().map(String::as_str).unwrap_or_default()
    }

    fn enter_workflow(&mut self, name: &str) {
        let count = self.executions.entry(name.to_string()).or_insert(0);
        *count += 1;
        let label = instance_label(name, *count);

        let parent = self.top().to_string();
        if self.hierarchy.add_edge(&parent, &label) {
            debug!("Workflow {} entered from {}", label, parent);
        }
        self.stack.push(label);
    }

    fn leave_workflow(&mut self) {
        if self.stack.len() > 1 {
            if let Some(label) = self.stack.pop() {
                debug!("Workflow {} finished", label);
            }
        }
    }

    /// Instance a new step is attributed to.
    ///
    /// In a chained run only repeated executions of the chain's first
    /// workflow keep their own label; everything else belongs to the chain.
    fn owning_workflow(&self) -> String {
        let top = self.top();
        match (&self.structure.chained_instance_label, self.structure.is_chained) {
            (Some(chain_label), true) => {
                if self.structure.first_link() == Some(workflow_name(top)) {
                    top.to_string()
                } else {
                    chain_label.clone()
                }
            }
            _ => top.to_string(),
        }
    }

    fn open_step(&mut self, index: usize, line: &str, number: u32, title: String) {
        self.close_step();

        let workflow = self.owning_workflow();
        let opened_in = self.top().to_string();
        let seen = self
            .occurrences
            .entry(workflow.clone())
            .or_default()
            .entry(title.clone())
            .or_insert(0);
        *seen += 1;
        let ordinal = *seen;

        let depth = self.stack.len() - 1;
        let parent_workflow = if depth > 0 {
            self.stack.get(depth - 1).cloned()
        } else {
            None
        };

        self.current = Some(Step {
            number,
            title_with_sequence: instance_label(&title, ordinal),
            title,
            workflow,
            workflow_path: self.stack.clone(),
            depth,
            parent_workflow,
            content: vec![line.to_string()],
            start_line: index,
            opened_in,
        });
    }

    fn close_step(&mut self) {
        if let Some(step) = self.current.take() {
            debug!(
                "Step {} '{}' in {}: {} lines",
                step.number,
                step.title_with_sequence,
                step.workflow,
                step.content.len()
            );
            self.steps.push(step);
        }
    }

    fn continue_step(&mut self, line: &str, next: Option<&str>) {
        let top = self.top().to_string();
        let Some(step) = self.current.as_mut() else {
            return;
        };
        step.content.push(line.to_string());

        // Close eagerly only while still inside the workflow the step
        // started in; otherwise the next header closes it.
        if next.is_some_and(is_step_header) && step.opened_in == top {
            self.close_step();
        }
    }

    fn run<S: AsRef<str>>(mut self, lines: &[S]) -> ParsedLog {
        for (index, line) in lines.iter().enumerate() {
            let line = line.as_ref();

            if let Some(name) = switched_workflow(line) {
                self.enter_workflow(&name);
                continue;
            }

            if is_summary_line(line) {
                if self.stack.len() == 1 {
                    self.root_summaries.push(index);
                }
                self.leave_workflow();
                continue;
            }

            if let Some((number, title)) = step_header(line) {
                self.open_step(index, line, number, title);
                continue;
            }

            let next = lines.get(index + 1).map(|next| next.as_ref());
            self.continue_step(line, next);
        }

        self.close_step();

        ParsedLog {
            steps: self.steps,
            hierarchy: self.hierarchy,
            root_summaries: self.root_summaries,
        }
    }
}

/// Splits log lines into steps attributed to workflow instances.
///
/// Without any switch marker every step belongs to the root instance
/// `"main [1]"`.
pub fn parse_steps<S: AsRef<str>>(lines: &[S], structure: &WorkflowStructure) -> ParsedLog {
    let parsed = StepParser::new(structure).run(lines);

    info!(
        "Parsed {} steps across {} parent workflows",
        parsed.steps.len(),
        parsed.hierarchy.len()
    );
    for (parent, children) in parsed.hierarchy.iter() {
        debug!("{} -> {}", parent, children.join(", "));
    }

    parsed
}
