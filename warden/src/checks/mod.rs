//! Check/fix reconciliation framework.
//!
//! A [`CheckRegistry`] runs registered [`Check`]s in registration order. Later
//! checks may rely on earlier ones having normalized workspace structure, so
//! order is part of each registry's contract.

pub mod builtin;

use std::any::Any;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::report::{CheckResult, CheckStatus, Report, Severity};
use crate::io::config::WardenConfig;
use crate::io::workspace::WorkspacePaths;

pub use builtin::{structural_checks, workspace_checks};

/// Read-only inputs shared by every check in a run.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub paths: &'a WorkspacePaths,
    pub config: &'a WardenConfig,
    pub verbose: bool,
    /// Fixes must not start daemons or agents. No built-in fix spawns a
    /// process, so this is currently only recorded on the run's span.
    pub no_start: bool,
}

pub trait Check {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn severity(&self) -> Severity;

    /// Detect; never mutates the workspace.
    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult;

    fn can_fix(&self) -> bool {
        false
    }

    /// Repair what `run` reported. Must be idempotent.
    fn fix(&self, _ctx: &CheckContext<'_>) -> Result<()> {
        bail!("{} cannot be fixed automatically", self.name())
    }
}

/// Ordered set of checks.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<Box<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a check. Registering the same check twice runs it twice.
    pub fn register(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn register_all(&mut self, checks: impl IntoIterator<Item = Box<dyn Check>>) {
        self.checks.extend(checks);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Report-only run.
    pub fn run(&self, ctx: &CheckContext<'_>) -> Report {
        self.execute(ctx, false, &mut |_, _| Ok(()))
            .unwrap_or_default()
    }

    /// Run and remediate every fixable warning/error.
    pub fn fix(&self, ctx: &CheckContext<'_>) -> Report {
        self.execute(ctx, true, &mut |_, _| Ok(()))
            .unwrap_or_default()
    }

    /// [`CheckRegistry::run`], writing one line per check to `out` as it completes.
    pub fn run_streaming(
        &self,
        ctx: &CheckContext<'_>,
        out: &mut dyn Write,
        indent: usize,
    ) -> std::io::Result<Report> {
        let pad = " ".repeat(indent);
        self.execute(ctx, false, &mut |check, result| {
            write_result(out, &pad, check, result, ctx.verbose)
        })
    }

    /// [`CheckRegistry::fix`], writing one line per check to `out` as it completes.
    pub fn fix_streaming(
        &self,
        ctx: &CheckContext<'_>,
        out: &mut dyn Write,
        indent: usize,
    ) -> std::io::Result<Report> {
        let pad = " ".repeat(indent);
        self.execute(ctx, true, &mut |check, result| {
            write_result(out, &pad, check, result, ctx.verbose)
        })
    }

    #[instrument(skip_all, fields(checks = self.checks.len(), fix = fix, no_start = ctx.no_start))]
    fn execute(
        &self,
        ctx: &CheckContext<'_>,
        fix: bool,
        on_result: &mut dyn FnMut(&dyn Check, &CheckResult) -> std::io::Result<()>,
    ) -> std::io::Result<Report> {
        let mut report = Report::new();
        for check in &self.checks {
            let check = check.as_ref();
            let mut result = guarded_run(check, ctx);
            if fix && check.can_fix() && result.status.needs_fix() {
                result = apply_fix(check, ctx, result);
            }
            debug!(check = check.name(), status = %result.status, "check finished");
            on_result(check, &result)?;
            report.push(result);
        }
        Ok(report)
    }
}

fn guarded_run(check: &dyn Check, ctx: &CheckContext<'_>) -> CheckResult {
    match catch_unwind(AssertUnwindSafe(|| check.run(ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let text = panic_payload_to_string(payload.as_ref());
            warn!(check = check.name(), panic = %text, "check panicked");
            CheckResult::error(check.name(), format!("check panicked: {text}"))
        }
    }
}

fn apply_fix(check: &dyn Check, ctx: &CheckContext<'_>, detected: CheckResult) -> CheckResult {
    let outcome = match catch_unwind(AssertUnwindSafe(|| check.fix(ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(anyhow::anyhow!(
            "fix panicked: {}",
            panic_payload_to_string(payload.as_ref())
        )),
    };
    match outcome {
        Ok(()) => {
            info!(check = check.name(), "fixed");
            CheckResult {
                status: CheckStatus::Fixed,
                message: format!("{} (fixed)", detected.message),
                fix_applied: true,
                ..detected
            }
        }
        Err(err) => {
            warn!(check = check.name(), err = %format!("{err:#}"), "fix failed");
            CheckResult {
                status: CheckStatus::Error,
                message: format!("{} (fix failed: {err:#})", detected.message),
                ..detected
            }
        }
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn write_result(
    out: &mut dyn Write,
    pad: &str,
    check: &dyn Check,
    result: &CheckResult,
    verbose: bool,
) -> std::io::Result<()> {
    writeln!(out, "{}", result.render_line(pad))?;
    if verbose {
        writeln!(out, "{pad}    {}", check.description())?;
        for detail in &result.details {
            writeln!(out, "{pad}    - {detail}")?;
        }
    }
    out.flush()
}
