//! Drift verdicts and their human rendering.

use serde::{Deserialize, Serialize};

use crate::core::steps::{STEP_LEGEND, progress_bar};
use crate::core::tracker_text::truncate_chars;

/// Escalation text sent to a drifting worker's session.
pub const NUDGE_MESSAGE: &str = "You have been working for several minutes with no molecule steps closed. \
Close each step IMMEDIATELY when you finish it: `bd close <step-id>`. \
Run `bd ready` to see your next step. Not closing steps signals you are \
not following the formula.";

/// Lifecycle state rendered without a parenthesized suffix.
pub const WORKING_STATE: &str = "working";

const MAX_ROW_TITLE_CHARS: usize = 55;

/// Drift verdict for one worker, recomputed every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDriftResult {
    pub rig: String,
    pub name: String,
    pub task_id: String,
    pub title: String,
    pub state: String,
    pub age_min: f64,
    pub closed: usize,
    pub total: usize,
    pub drifting: bool,
    pub nudged: bool,
    pub branch: String,
}

impl StepDriftResult {
    /// `<rig>/<name>` as understood by the fleet's messaging commands.
    pub fn address(&self) -> String {
        format!("{}/{}", self.rig, self.name)
    }
}

/// A worker drifts once it has been alive for `threshold_minutes` with no
/// canonical step closed. Any closed step clears the verdict.
pub fn is_drifting(age_minutes: f64, threshold_minutes: u32, closed: usize) -> bool {
    closed == 0 && age_minutes >= f64::from(threshold_minutes)
}

/// Render one worker block: the summary row, its session tail, then markers.
pub fn render_worker(result: &StepDriftResult, tail: &[String]) -> String {
    let mut out = String::new();
    let progress = progress_bar(result.closed, result.total);
    let title = truncate_chars(&result.title, MAX_ROW_TITLE_CHARS);
    let age = whole_minutes(result.age_min);

    let mut row = format!(
        "  ▶ {:<10} {:<12} {progress}  {title}",
        result.name, result.task_id
    );
    if result.state != WORKING_STATE {
        row.push_str(&format!(" ({})", result.state));
    }
    if age > 0 {
        row.push_str(&format!(" {age}m"));
    }
    out.push_str(&row);
    out.push('\n');

    for line in tail {
        out.push_str(&format!("    │ {line}\n"));
    }
    if result.drifting {
        out.push_str(&format!(
            "    ⚡ Step drift detected ({age}m, 0 steps closed)\n"
        ));
    }
    if result.nudged {
        out.push_str("    ⚡ Nudged\n");
    }
    out.push('\n');
    out
}

/// Footer printed after the worker blocks.
pub fn render_legend() -> String {
    format!("  Steps: {STEP_LEGEND}\n  ● = done  ○ = pending  ⚡ = drifting\n")
}

/// Placeholder line for an empty fleet.
pub const NO_WORKERS_LINE: &str = "  No active polecats.\n";

fn whole_minutes(age_min: f64) -> u64 {
    if age_min > 0.0 { age_min.trunc() as u64 } else { 0 }
}
