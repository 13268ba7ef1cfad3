//! Log Marker Vocabulary
//!
//! The literal markers the CI runner prints into its console output, and
//! small helpers for recognizing them. Everything that knows what a line
//! *looks like* lives here so the scanners only deal with structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// Header printed once when several workflows run as a chain.
pub const CHAIN_MARKER: &str = "Running workflows:";

/// Separator between workflow names in the chain header.
pub const CHAIN_ARROW: &str = "→";

/// Printed when a (possibly nested) workflow starts.
pub const SWITCH_MARKER: &str = "Switching to workflow:";

/// Opens a summary table block.
pub const SUMMARY_MARKER: &str = "bitrise summary:";

/// Last content row of a summary table.
pub const TOTAL_RUNTIME_MARKER: &str = "Total runtime:";

/// ANSI color sequence used for a failed status cell (bold red).
pub const FAILURE_COLOR: &str = "31;1m";

/// Literal status suffix on a failed row.
pub const FAILED_SUFFIX: &str = "(Failed)";

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI regex"));

static CHAIN_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Running workflows:\s*(.+)").expect("valid chain regex"));

static SWITCH_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Switching to workflow:\s+(.+)").expect("valid switch regex"));

static SUMMARY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrise summary:\s+(.+?)\s*\|").expect("valid summary regex"));

static STEP_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|\s*\((\d+)\)\s+(.*?)\s*\|$").expect("valid step regex"));

static STATUS_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\((Failed|Skipped|exit code: -?\d+)\).*").expect("valid suffix regex"));

/// Splits log text into lines, dropping the `\r` of CRLF line endings.
///
/// A trailing newline yields a final empty line, so joining the result
/// with `\n` restores LF-only text.
pub fn split_lines(log: &str) -> Vec<&str> {
    log.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Removes ANSI color escape sequences from a line.
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

/// Returns the arrow-joined chain string if this line is a chain header.
pub fn chain_header(line: &str) -> Option<String> {
    if !line.contains(CHAIN_MARKER) || !line.contains(CHAIN_ARROW) {
        return None;
    }

    let clean = strip_ansi(line);
    CHAIN_HEADER
        .captures(&clean)
        .map(|caps| caps[1].trim().to_string())
        .filter(|chain| !chain.is_empty())
}

/// Returns the workflow name if this line announces a workflow switch.
pub fn switched_workflow(line: &str) -> Option<String> {
    if !line.contains(SWITCH_MARKER) {
        return None;
    }

    SWITCH_LINE
        .captures(line)
        .map(|caps| strip_ansi(&caps[1]).trim().to_string())
}

/// True for any line that opens a summary block.
pub fn is_summary_line(line: &str) -> bool {
    line.contains(SUMMARY_MARKER)
}

/// Returns the workflow name embedded in a summary header line.
pub fn summary_workflow(line: &str) -> Option<String> {
    SUMMARY_HEADER
        .captures(line)
        .map(|caps| strip_ansi(&caps[1]).trim().to_string())
}

/// Parses a step header line into its number and title.
pub fn step_header(line: &str) -> Option<(u32, String)> {
    let caps = STEP_HEADER.captures(line)?;
    let number = caps[1].parse().ok()?;
    Some((number, caps[2].to_string()))
}

/// True if the line introduces a new step.
pub fn is_step_header(line: &str) -> bool {
    STEP_HEADER.is_match(line)
}

/// True for table border lines (`+----+`).
pub fn is_border(line: &str) -> bool {
    line.starts_with('+')
}

/// Strips color codes and a trailing `(Failed)`, `(Skipped)` or
/// `(exit code: N)` annotation from a summary row's title cell.
pub fn clean_step_name(cell: &str) -> String {
    let no_color = strip_ansi(cell);
    STATUS_SUFFIX.replace(&no_color, "").trim().to_string()
}
