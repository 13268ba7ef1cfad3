//! Workflow Structure Detection
//!
//! A single pass over the log decides whether the run chained several
//! workflows, nested workflow invocations inside steps, both, or neither.

use log::debug;

use super::markers::{chain_header, is_summary_line, CHAIN_ARROW};
use super::model::{instance_label, WorkflowStructure};

/// Classifies a run from its raw log lines.
///
/// The first chain header fixes the chain; a chain always counts as one
/// logical execution, so its label carries the ordinal `[1]`. More than
/// one summary block means at least one workflow ran nested.
pub fn detect_structure<S: AsRef<str>>(lines: &[S]) -> WorkflowStructure {
    let mut structure = WorkflowStructure::default();

    if let Some(chain) = lines.iter().find_map(|line| chain_header(line.as_ref())) {
        structure.is_chained = true;
        structure.chained_names = chain
            .split(CHAIN_ARROW)
            .map(|name| name.trim().to_string())
            .collect();
        structure.chained_instance_label = Some(instance_label(&chain, 1));
    }

    let summaries = lines
        .iter()
        .filter(|line| is_summary_line(line.as_ref()))
        .count();
    structure.has_nested = summaries > 1;

    debug!(
        "Detected structure: chained={} ({:?}), nested={} ({} summaries)",
        structure.is_chained, structure.chained_names, structure.has_nested, summaries
    );

    structure
}
