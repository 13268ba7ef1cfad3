//! Build Log Data Model
//!
//! Core data structures produced while decomposing a build log: the
//! detected workflow structure, the parsed steps, the parent/child
//! workflow hierarchy and the failed rows read from summary tables.
//!
//! # Labels
//!
//! Workflow instances and repeated steps are both disambiguated with an
//! ordinal suffix, `"<name> [<k>]"`:
//!
//! ```text
//! Switching to workflow: unit-tests      -> "unit-tests [1]"
//! Switching to workflow: unit-tests      -> "unit-tests [2]"
//! | (4) Build |  (second one in [2])     -> "Build [2]"
//! ```

use std::collections::HashMap;

/// Implicit workflow that owns everything before the first switch marker.
pub const ROOT_WORKFLOW: &str = "main";

/// Formats a name with its execution/occurrence ordinal.
pub fn instance_label(name: &str, ordinal: usize) -> String {
    format!("{} [{}]", name, ordinal)
}

/// Returns the bare workflow name of an instance label (`"build [2]"` -> `"build"`).
pub fn workflow_name(label: &str) -> &str {
    match label.rsplit_once(" [") {
        Some((name, suffix))
            if suffix.ends_with(']')
                && suffix.len() > 1
                && suffix[..suffix.len() - 1].chars().all(|c| c.is_ascii_digit()) =>
        {
            name
        }
        _ => label,
    }
}

/// Label of the implicit root workflow instance.
pub fn root_label() -> String {
    instance_label(ROOT_WORKFLOW, 1)
}

/// How the workflows of a run relate to each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowStructure {
    /// Several workflows ran back-to-back from one invocation
    pub is_chained: bool,

    /// Workflow names of the chain, in order (empty if not chained)
    pub chained_names: Vec<String>,

    /// Single instance label used for every step of a chained run
    pub chained_instance_label: Option<String>,

    /// More than one summary block exists
    pub has_nested: bool,
}

impl WorkflowStructure {
    /// First workflow of the chain, if any.
    pub fn first_link(&self) -> Option<&str> {
        self.chained_names.first().map(String::as_str)
    }

    /// Chained but every workflow reported through one summary.
    pub fn is_sequential_chain(&self) -> bool {
        self.is_chained && !self.has_nested
    }
}

/// One step of the build, with its log lines and workflow context.
#[derive(Debug, Clone)]
pub struct Step {
    /// Number printed in the step header
    pub number: u32,

    /// Title printed in the step header
    pub title: String,

    /// Title plus its occurrence ordinal within the owning workflow instance
    pub title_with_sequence: String,

    /// Owning workflow instance label
    pub workflow: String,

    /// Workflow stack from the root to the owning instance
    pub workflow_path: Vec<String>,

    /// Nesting depth (0 = root workflow)
    pub depth: usize,

    /// Instance label of the enclosing workflow, if nested
    pub parent_workflow: Option<String>,

    /// Raw log lines, header included
    pub content: Vec<String>,

    /// Line index of the step header in the full log
    pub start_line: usize,

    /// Workflow stack top when the header was seen
    pub opened_in: String,
}

impl Step {
    /// Name shown to users when listing failed steps.
    pub fn display_name(&self) -> String {
        format!("{} (in {})", self.title, workflow_name(&self.workflow))
    }

    /// Step content as a single newline-joined string.
    pub fn content_text(&self) -> String {
        self.content.join("\n")
    }

    /// True if the workflow instance appears anywhere on this step's stack.
    pub fn runs_under(&self, label: &str) -> bool {
        self.workflow == label || self.workflow_path.iter().any(|w| w == label)
    }
}

/// Parent instance label -> child instance labels, both in discovery order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowHierarchy {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl WorkflowHierarchy {
    /// Creates an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `parent -> child`. Returns false if the edge already existed.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> bool {
        let slot = match self.index.get(parent) {
            Some(&slot) => slot,
            None => {
                self.entries.push((parent.to_string(), Vec::new()));
                self.index.insert(parent.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let children = &mut self.entries[slot].1;
        if children.iter().any(|c| c == child) {
            return false;
        }
        children.push(child.to_string());
        true
    }

    /// Children of a workflow instance (empty if it has none).
    pub fn children(&self, parent: &str) -> &[String] {
        self.index
            .get(parent)
            .map(|&slot| self.entries[slot].1.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates parents and their children in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(parent, children)| (parent.as_str(), children.as_slice()))
    }

    /// Number of parents with at least one child.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no workflow switch was ever recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A failed row from a summary table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailedStepRecord {
    /// Clean step name with its occurrence ordinal, e.g. `"Run Tests [1]"`
    pub step_name: String,

    /// Workflow instance the summary block belongs to
    pub workflow_label: String,
}

impl FailedStepRecord {
    pub fn new(step_name: impl Into<String>, workflow_label: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            workflow_label: workflow_label.into(),
        }
    }
}

/// A summary table block located in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySection {
    /// Line index of the summary header
    pub start: usize,

    /// Line index of the closing border (inclusive)
    pub end: usize,

    /// Workflow instance label assigned to this block
    pub workflow_label: String,

    /// Raw block text
    pub text: String,
}
