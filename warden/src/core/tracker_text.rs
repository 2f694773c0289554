//! Translation boundary for collaborator text renderings.
//!
//! The task tracker and session manager only expose human-oriented text.
//! Every pattern used to scrape that text lives here so a format change in
//! either collaborator has a single failure point.
//!
//! Grammar of a tracker record rendering (relevant lines only):
//!
//! ```text
//! ○ gt-abc12 · Fix the widget [P2 · OPEN]          <- title line: "<id> · <title> ["
//!   attached_molecule: gt-wisp-9k2                 <- explicit attachment
//!   gt-wisp-9k2: mol-polecat-work (wisp)           <- fallback attachment
//!   ↳ gt-wisp-9k2.1: Load context ● ✓              <- step line, closed
//!   ↳ gt-wisp-9k2.2: Set up working branch ● ○     <- step line, open
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::core::steps::StepStatuses;

/// Workflow template every polecat molecule is instantiated from.
pub const STEP_TEMPLATE: &str = "mol-polecat-work";

/// Glyph that marks a sub-item (step) line.
pub const STEP_LINE_MARKER: char = '↳';
/// Glyph present on a closed sub-item line.
pub const STEP_CLOSED_MARKER: char = '✓';

const MAX_TITLE_CHARS: usize = 80;

/// Extract step labels and their closed flag from a record rendering.
pub fn parse_step_statuses(rendering: &str) -> StepStatuses {
    static STEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s*(.+?)\s*●").unwrap());

    let mut statuses = StepStatuses::new();
    for line in rendering.lines() {
        if !line.contains(STEP_LINE_MARKER) {
            continue;
        }
        let closed = line.contains(STEP_CLOSED_MARKER);
        if let Some(caps) = STEP_RE.captures(line) {
            statuses.insert(caps[1].trim(), closed);
        }
    }
    statuses
}

/// Find the step record attached to a task rendering.
///
/// Prefers an explicit `attached_molecule:` field; otherwise looks for a wisp
/// reference on a line that also names `template`.
pub fn parse_attached_record(rendering: &str, template: &str) -> Option<String> {
    static ATTACHED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"attached_molecule:\s*(\S+)").unwrap());
    static WISP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S+-wisp-\S+)").unwrap());

    if let Some(caps) = ATTACHED_RE.captures(rendering) {
        return Some(caps[1].to_string());
    }
    rendering
        .lines()
        .filter(|line| line.contains("wisp-") && line.contains(template))
        .find_map(|line| WISP_RE.captures(line))
        .map(|caps| caps[1].trim_end_matches(':').to_string())
}

/// Extract the title of `task_id` from its rendering (max 80 characters).
pub fn parse_title(rendering: &str, task_id: &str) -> Option<String> {
    static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"·\s*(.+?)\s*\[").unwrap());

    if task_id.is_empty() {
        return None;
    }
    rendering
        .lines()
        .filter(|line| line.contains(task_id))
        .find_map(|line| TITLE_RE.captures(line))
        .map(|caps| truncate_chars(&caps[1], MAX_TITLE_CHARS))
}

/// Keep the last `max_lines` meaningful lines of session output.
///
/// Drops two known noise lines (stale-binary warnings and their "→ Run" hint),
/// blank lines, and truncates each line to `max_width` characters.
pub fn filter_session_tail(output: &str, max_lines: usize, max_width: usize) -> Vec<String> {
    let kept: Vec<&str> = output
        .lines()
        .filter(|line| !is_session_noise(line))
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = kept.len().saturating_sub(max_lines);
    kept[start..]
        .iter()
        .map(|line| truncate_chars(line, max_width))
        .collect()
}

fn is_session_noise(line: &str) -> bool {
    line.starts_with("⚠ gt binary") || line.trim().starts_with("→ Run")
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WISP_RENDERING: &str = "\
○ gt-wisp-9k2 · mol-polecat-work [P2 · OPEN]
  Children:
    ↳ gt-wisp-9k2.1: Load context and start ● ✓
    ↳ gt-wisp-9k2.2: Set up working branch ● ✓
    ↳ gt-wisp-9k2.3: Verify tests pass (precheck) ● ○
    ↳ gt-wisp-9k2.4: Implement the feature ● ○
  Parent: gt-abc12
";

    #[test]
    fn parses_step_lines_from_captured_rendering() {
        let statuses = parse_step_statuses(WISP_RENDERING);
        let parsed: Vec<(&str, bool)> = statuses.iter().collect();
        assert_eq!(
            parsed,
            vec![
                ("Load context and start", true),
                ("Set up working branch", true),
                ("Verify tests pass (precheck)", false),
                ("Implement the feature", false),
            ]
        );
        assert_eq!(crate::core::steps::count_closed_steps(&statuses), 2);
    }

    #[test]
    fn step_lines_without_marker_are_ignored() {
        let statuses = parse_step_statuses("gt-1: Load context ● ✓\n↳ no colon here ●\n");
        assert!(statuses.is_empty());
    }

    #[test]
    fn attached_field_wins() {
        let rendering = "\
○ gt-abc12 · Fix the widget [P2 · IN_PROGRESS]
  attached_molecule: gt-wisp-777
  gt-wisp-111: mol-polecat-work (wisp)
";
        assert_eq!(
            parse_attached_record(rendering, STEP_TEMPLATE),
            Some("gt-wisp-777".to_string())
        );
    }

    #[test]
    fn falls_back_to_wisp_reference_with_template() {
        let rendering = "\
○ gt-abc12 · Fix the widget [P2 · IN_PROGRESS]
  Dependents:
    gt-wisp-050: patrol-digest (wisp)
    gt-wisp-111: mol-polecat-work (wisp)
";
        assert_eq!(
            parse_attached_record(rendering, STEP_TEMPLATE),
            Some("gt-wisp-111".to_string())
        );
        assert_eq!(parse_attached_record("nothing here", STEP_TEMPLATE), None);
    }

    #[test]
    fn parses_title_for_task_line() {
        let rendering = "○ gt-abc12 · Fix the widget [P2 · OPEN]\nDescription: gt-abc12 · not this [x]\n";
        assert_eq!(
            parse_title(rendering, "gt-abc12"),
            Some("Fix the widget".to_string())
        );
        assert_eq!(parse_title(rendering, ""), None);
        assert_eq!(parse_title(rendering, "gt-zzz"), None);
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "x".repeat(120);
        let rendering = format!("○ gt-1 · {long} [P1]");
        assert_eq!(parse_title(&rendering, "gt-1").map(|t| t.len()), Some(80));
    }

    #[test]
    fn session_tail_drops_noise_and_keeps_last_lines() {
        let output = "\
⚠ gt binary is stale (built from 1a2b)
   → Run `make install` to rebuild
line one

line two
line three
";
        assert_eq!(
            filter_session_tail(output, 2, 100),
            vec!["line two".to_string(), "line three".to_string()]
        );
        assert_eq!(filter_session_tail(output, 20, 4)[0], "line");
    }
}
