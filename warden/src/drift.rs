//! Fleet drift monitor for `warden patrol step-drift`.
//!
//! One cycle enumerates active workers, resolves each worker's data branch and
//! step record, counts closed canonical steps and compares session age to the
//! threshold. Every collaborator failure degrades to an empty fact.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::branch::{POLECAT_BRANCH_KIND, branch_prefix, select_latest_branch};
use crate::core::drift::{
    NO_WORKERS_LINE, NUDGE_MESSAGE, StepDriftResult, is_drifting, render_legend, render_worker,
};
use crate::core::steps::{STEPS_ORDER, StepStatuses, count_closed_steps, round_to_1};
use crate::core::tracker_text::{
    STEP_TEMPLATE, filter_session_tail, parse_attached_record, parse_step_statuses, parse_title,
};
use crate::io::branches::BranchStore;
use crate::io::config::DriftConfig;
use crate::io::fleet::{FleetDirectory, PolecatInfo};
use crate::io::sessions::{SessionManager, age_minutes, session_name};
use crate::io::tracker::TaskTracker;
use crate::io::workspace::WorkspacePaths;

const RULE_WIDTH: usize = 80;
const PEEK_LINE_WIDTH: usize = 100;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const UNKNOWN_TITLE: &str = "?";

/// Resolved options for one invocation (config defaults + CLI overrides).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftOptions {
    pub threshold_minutes: u32,
    pub nudge: bool,
    pub interval: Duration,
    pub peek_lines: usize,
}

impl DriftOptions {
    /// `interval_arg` wins when it parses to a positive number of seconds.
    pub fn resolve(
        config: &DriftConfig,
        threshold: Option<u32>,
        nudge: bool,
        interval_arg: Option<&str>,
    ) -> Self {
        let interval_secs = interval_arg
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(config.watch_interval_secs);
        Self {
            threshold_minutes: threshold.unwrap_or(config.threshold_minutes),
            nudge,
            interval: Duration::from_secs(interval_secs),
            peek_lines: config.peek_lines,
        }
    }
}

/// Drift evaluation over the fleet's collaborators.
pub struct DriftMonitor<'a> {
    paths: &'a WorkspacePaths,
    fleet: &'a dyn FleetDirectory,
    sessions: &'a dyn SessionManager,
    branches: &'a dyn BranchStore,
    tracker: &'a dyn TaskTracker,
}

impl<'a> DriftMonitor<'a> {
    pub fn new(
        paths: &'a WorkspacePaths,
        fleet: &'a dyn FleetDirectory,
        sessions: &'a dyn SessionManager,
        branches: &'a dyn BranchStore,
        tracker: &'a dyn TaskTracker,
    ) -> Self {
        Self {
            paths,
            fleet,
            sessions,
            branches,
            tracker,
        }
    }

    /// Evaluate every active worker at `now` (Unix seconds), in listing order.
    #[instrument(skip_all, fields(threshold_minutes = threshold_minutes))]
    pub fn check(&self, threshold_minutes: u32, now: i64) -> Vec<StepDriftResult> {
        let workers = self.fleet.list_all_workers();
        debug!(count = workers.len(), "evaluating workers");
        workers
            .iter()
            .map(|worker| self.evaluate(worker, threshold_minutes, now))
            .collect()
    }

    /// Check, then nudge drifting workers when requested.
    pub fn run_cycle(&self, options: &DriftOptions, now: i64) -> Vec<StepDriftResult> {
        let mut results = self.check(options.threshold_minutes, now);
        if options.nudge {
            self.nudge_drifting(&mut results);
        }
        results
    }

    fn evaluate(&self, worker: &PolecatInfo, threshold_minutes: u32, now: i64) -> StepDriftResult {
        let branch = self.resolve_branch(worker);
        let task_rendering = self.tracker.show(&worker.task_id, None).unwrap_or_default();
        let step_record = parse_attached_record(&task_rendering, STEP_TEMPLATE);
        let statuses = step_record
            .as_deref()
            .map(|record| self.read_step_statuses(record, &branch))
            .unwrap_or_default();
        let closed = count_closed_steps(&statuses);
        let created = self.sessions.created_at(&session_name(&worker.rig, &worker.name));
        let age = age_minutes(created, now);
        let title = parse_title(&task_rendering, &worker.task_id)
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        debug!(
            worker = %format!("{}/{}", worker.rig, worker.name),
            branch = %branch,
            step_record = ?step_record,
            closed,
            age,
            "evaluated worker"
        );
        StepDriftResult {
            rig: worker.rig.clone(),
            name: worker.name.clone(),
            task_id: worker.task_id.clone(),
            title,
            state: worker.state.clone(),
            age_min: round_to_1(age),
            closed,
            total: STEPS_ORDER.len(),
            drifting: is_drifting(age, threshold_minutes, closed),
            nudged: false,
            branch,
        }
    }

    /// Most recent `polecat-<name>-<ts>` branch; empty when unresolved.
    fn resolve_branch(&self, worker: &PolecatInfo) -> String {
        let candidates = self
            .branches
            .list_branches(&self.paths.rig_data_dir(&worker.rig));
        let prefix = branch_prefix(POLECAT_BRANCH_KIND, &worker.name);
        select_latest_branch(&candidates, &prefix).unwrap_or_default()
    }

    fn read_step_statuses(&self, record: &str, branch: &str) -> StepStatuses {
        let pinned = (!branch.is_empty()).then_some(branch);
        self.tracker
            .show(record, pinned)
            .map(|rendering| parse_step_statuses(&rendering))
            .unwrap_or_default()
    }

    /// Send the escalation message to each drifting worker; delivery is best-effort.
    pub fn nudge_drifting(&self, results: &mut [StepDriftResult]) {
        for result in results.iter_mut().filter(|result| result.drifting) {
            let address = result.address();
            match self.sessions.nudge(&address, NUDGE_MESSAGE) {
                Ok(()) => info!(worker = %address, "nudged"),
                Err(err) => warn!(worker = %address, err = %format!("{err:#}"), "nudge failed"),
            }
            result.nudged = true;
        }
    }

    /// Worker blocks with session tails, then the legend.
    pub fn render_pretty(&self, results: &[StepDriftResult], peek_lines: usize) -> String {
        if results.is_empty() {
            return NO_WORKERS_LINE.to_string();
        }
        let mut out = String::new();
        for result in results {
            let tail = self
                .sessions
                .peek(&result.address(), peek_lines)
                .map(|raw| filter_session_tail(&raw, peek_lines, PEEK_LINE_WIDTH))
                .unwrap_or_default();
            out.push_str(&render_worker(result, &tail));
        }
        out.push_str(&render_legend());
        out
    }

    /// Single-shot human report.
    pub fn report(&self, options: &DriftOptions, now: i64, out: &mut dyn Write) -> Result<()> {
        let results = self.run_cycle(options, now);
        writeln!(out, "patrol-step-drift")?;
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        write!(out, "{}", self.render_pretty(&results, options.peek_lines))?;
        Ok(())
    }

    /// Live dashboard: clear, render a full cycle, sleep, repeat.
    ///
    /// `should_stop` is consulted after each cycle with the number of cycles
    /// completed so far. Returns that count.
    pub fn watch(
        &self,
        options: &DriftOptions,
        out: &mut dyn Write,
        mut sleep: impl FnMut(Duration),
        mut should_stop: impl FnMut(usize) -> bool,
    ) -> Result<usize> {
        let mut cycles = 0usize;
        loop {
            write!(out, "{CLEAR_SCREEN}")?;
            writeln!(
                out,
                "patrol-step-drift  ({})",
                Local::now().format("%H:%M:%S")
            )?;
            writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
            let results = self.run_cycle(options, Utc::now().timestamp());
            write!(out, "{}", self.render_pretty(&results, options.peek_lines))?;
            out.flush().context("flush dashboard")?;

            cycles += 1;
            if should_stop(cycles) {
                return Ok(cycles);
            }
            sleep(options.interval);
        }
    }
}

/// Machine-readable report: JSON array with two-space indentation.
pub fn render_agent(results: &[StepDriftResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeBranches, FakeFleet, FakeSessions, FakeTracker, TestWorkspace, polecat,
    };

    const NOW: i64 = 1_760_000_000;

    const TASK: &str = "\
○ gt-abc12 · Fix the widget [P2 · IN_PROGRESS]
  attached_molecule: gt-wisp-9k2
";

    const STEPS_ONE_CLOSED: &str = "\
○ gt-wisp-9k2 · mol-polecat-work [P2 · OPEN]
    ↳ gt-wisp-9k2.1: Load context and start ● ✓
    ↳ gt-wisp-9k2.2: Set up working branch ● ○
";

    const STEPS_NONE_CLOSED: &str = "\
○ gt-wisp-9k2 · mol-polecat-work [P2 · OPEN]
    ↳ gt-wisp-9k2.1: Load context ● ○
";

    struct Fixture {
        ws: TestWorkspace,
        fleet: FakeFleet,
        sessions: FakeSessions,
        branches: FakeBranches,
        tracker: FakeTracker,
    }

    impl Fixture {
        fn new(age_minutes: i64, steps: &str) -> Self {
            let fleet = FakeFleet::new().with_rig(
                "gastown",
                vec![polecat("gastown", "Furiosa", "working", "gt-abc12")],
            );
            let sessions = FakeSessions::new()
                .with_created("gt-gastown-Furiosa", NOW - age_minutes * 60)
                .with_peek("gastown/Furiosa", "⚠ gt binary is stale\nrunning tests\n\n  → Run make\n");
            let branches = FakeBranches::new().with_branches(
                "gastown",
                &["main", "polecat-furiosa-100", "polecat-furiosa-9999", "polecat-nux-5"],
            );
            let tracker = FakeTracker::new()
                .with_record("gt-abc12", None, TASK)
                .with_record("gt-wisp-9k2", Some("polecat-furiosa-9999"), steps)
                .with_record("gt-wisp-9k2", None, STEPS_ONE_CLOSED);
            Self {
                ws: TestWorkspace::new(),
                fleet,
                sessions,
                branches,
                tracker,
            }
        }

        fn run(&self, options: &DriftOptions) -> Vec<StepDriftResult> {
            let paths = self.ws.paths();
            DriftMonitor::new(&paths, &self.fleet, &self.sessions, &self.branches, &self.tracker)
                .run_cycle(options, NOW)
        }
    }

    fn options(nudge: bool) -> DriftOptions {
        DriftOptions::resolve(&DriftConfig::default(), None, nudge, None)
    }

    #[test]
    fn reads_steps_from_latest_worker_branch() {
        let fixture = Fixture::new(12, STEPS_NONE_CLOSED);
        let results = fixture.run(&options(false));
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.branch, "polecat-furiosa-9999");
        assert_eq!(result.title, "Fix the widget");
        assert_eq!(result.closed, 0);
        assert_eq!(result.total, 9);
        assert_eq!(result.age_min, 12.0);
        assert!(result.drifting);
        assert!(!result.nudged);
        assert!(fixture.sessions.nudges().is_empty());
    }

    #[test]
    fn closed_step_prevents_drift() {
        let fixture = Fixture::new(45, STEPS_ONE_CLOSED);
        let results = fixture.run(&options(true));
        assert_eq!(results[0].closed, 1);
        assert!(!results[0].drifting);
        assert!(fixture.sessions.nudges().is_empty());
    }

    #[test]
    fn young_worker_is_not_drifting() {
        let fixture = Fixture::new(3, STEPS_NONE_CLOSED);
        assert!(!fixture.run(&options(true))[0].drifting);
    }

    #[test]
    fn nudge_marks_result_even_when_delivery_fails() {
        let mut fixture = Fixture::new(12, STEPS_NONE_CLOSED);
        fixture.sessions = fixture.sessions.failing_nudges();
        let results = fixture.run(&options(true));
        assert!(results[0].nudged);
        assert_eq!(fixture.sessions.nudges().len(), 1);
    }

    #[test]
    fn unavailable_collaborators_degrade_to_zero_values() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let fleet =
            FakeFleet::new().with_rig("gastown", vec![polecat("gastown", "nux", "idle", "")]);
        let sessions = FakeSessions::new();
        let branches = FakeBranches::new();
        let tracker = FakeTracker::new();
        let monitor = DriftMonitor::new(&paths, &fleet, &sessions, &branches, &tracker);

        let results = monitor.check(5, NOW);
        assert_eq!(results[0].title, "?");
        assert_eq!(results[0].branch, "");
        assert_eq!(results[0].age_min, 0.0);
        assert!(!results[0].drifting);
    }

    #[test]
    fn pretty_report_filters_session_noise() {
        let fixture = Fixture::new(12, STEPS_NONE_CLOSED);
        let paths = fixture.ws.paths();
        let monitor = DriftMonitor::new(
            &paths,
            &fixture.fleet,
            &fixture.sessions,
            &fixture.branches,
            &fixture.tracker,
        );
        let mut out = Vec::new();
        monitor.report(&options(false), NOW, &mut out).expect("report");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("patrol-step-drift\n"));
        assert!(text.contains("    │ running tests\n"));
        assert!(!text.contains("gt binary"));
        assert!(!text.contains("→ Run"));
        assert!(text.contains("⚡ Step drift detected (12m, 0 steps closed)"));
        assert!(text.contains("  Steps: ①load"));
    }

    #[test]
    fn empty_fleet_renders_placeholder() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let (fleet, sessions, branches, tracker) = (
            FakeFleet::new(),
            FakeSessions::new(),
            FakeBranches::new(),
            FakeTracker::new(),
        );
        let monitor = DriftMonitor::new(&paths, &fleet, &sessions, &branches, &tracker);
        assert_eq!(monitor.render_pretty(&[], 20), "  No active polecats.\n");
    }

    #[test]
    fn watch_stops_when_predicate_says_so() {
        let fixture = Fixture::new(0, STEPS_NONE_CLOSED);
        let paths = fixture.ws.paths();
        let monitor = DriftMonitor::new(
            &paths,
            &fixture.fleet,
            &fixture.sessions,
            &fixture.branches,
            &fixture.tracker,
        );
        let mut out = Vec::new();
        let mut slept = Vec::new();
        let cycles = monitor
            .watch(&options(false), &mut out, |d| slept.push(d), |n| n == 2)
            .expect("watch");
        assert_eq!(cycles, 2);
        assert_eq!(slept, vec![Duration::from_secs(30)]);
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.matches(CLEAR_SCREEN).count(), 2);
        assert!(text.contains("patrol-step-drift  ("));
    }

    #[test]
    fn interval_argument_falls_back_when_invalid() {
        let config = DriftConfig::default();
        let interval = |arg| DriftOptions::resolve(&config, None, false, arg).interval;
        assert_eq!(interval(Some("10")), Duration::from_secs(10));
        assert_eq!(interval(Some("0")), Duration::from_secs(30));
        assert_eq!(interval(Some("-4")), Duration::from_secs(30));
        assert_eq!(interval(Some("soon")), Duration::from_secs(30));
        assert_eq!(interval(None), Duration::from_secs(30));
        assert_eq!(
            DriftOptions::resolve(&config, Some(8), false, None).threshold_minutes,
            8
        );
    }

    #[test]
    fn agent_output_is_a_json_array() {
        let fixture = Fixture::new(12, STEPS_NONE_CLOSED);
        let json = render_agent(&fixture.run(&options(false))).expect("json");
        assert!(json.starts_with("[\n  {\n    \"rig\": \"gastown\""));
    }
}
