//! `warden upgrade`: post-install migration of a workspace.
//!
//! Five idempotent steps run in order, each printing its own section and
//! returning an [`UpgradeStepResult`]. Step failures are recorded as details
//! and never abort later steps.

use std::fs;
use std::io::{ErrorKind, Write};

use anyhow::Result;
use tracing::{info, instrument};

use crate::checks::{CheckContext, CheckRegistry, structural_checks};
use crate::core::hooks::SyncOutcome;
use crate::io::config::WardenConfig;
use crate::io::daemon_config::{ensure_daemon_config, load_daemon_config};
use crate::io::formulas::FormulaRefresher;
use crate::io::identity::{
    IdentityState, ensure_identity_link, identity_state, render_identity_doc, write_identity_doc,
};
use crate::io::workspace::WorkspacePaths;
use crate::sync::HooksSync;

const OK: &str = "✓";
const WARN: &str = "⚠";
const FAIL: &str = "✖";
const ARROW: &str = "→";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Report what would change without writing anything.
    pub dry_run: bool,
    pub verbose: bool,
    /// Never start daemons or agents while fixing.
    pub no_start: bool,
}

/// What one step changed (or would change under dry-run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeStepResult {
    pub step: &'static str,
    pub changed: usize,
    pub skipped: usize,
    pub details: Vec<String>,
}

impl UpgradeStepResult {
    fn new(step: &'static str) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }
}

/// Runs the upgrade steps against one workspace.
pub struct Upgrade<'a> {
    paths: &'a WorkspacePaths,
    config: &'a WardenConfig,
    formulas: &'a dyn FormulaRefresher,
    options: UpgradeOptions,
}

impl<'a> Upgrade<'a> {
    pub fn new(
        paths: &'a WorkspacePaths,
        config: &'a WardenConfig,
        formulas: &'a dyn FormulaRefresher,
        options: UpgradeOptions,
    ) -> Self {
        Self {
            paths,
            config,
            formulas,
            options,
        }
    }

    /// Run every step, then the summary. Returns the per-step results.
    #[instrument(skip_all, fields(dry_run = self.options.dry_run))]
    pub fn run(&self, out: &mut dyn Write) -> Result<Vec<UpgradeStepResult>> {
        if self.options.dry_run {
            writeln!(out, "\nwarden upgrade Dry run — showing what would change")?;
        } else {
            writeln!(out, "\nwarden upgrade Post-install migration")?;
        }

        let results = vec![
            self.structural_checks(out)?,
            self.identity_doc(out)?,
            self.daemon_config(out)?,
            self.hooks_sync(out)?,
            self.formulas(out)?,
        ];
        write_summary(out, &results, self.options.dry_run)?;
        info!(changed = total_changed(&results), "upgrade finished");
        Ok(results)
    }

    pub fn structural_checks(&self, out: &mut dyn Write) -> Result<UpgradeStepResult> {
        let mut result = UpgradeStepResult::new("Structural checks");
        writeln!(out, "\n  1. Running structural checks (doctor --fix)...")?;

        let mut registry = CheckRegistry::new();
        registry.register_all(structural_checks());
        let ctx = CheckContext {
            paths: self.paths,
            config: self.config,
            verbose: self.options.verbose,
            no_start: self.options.no_start,
        };
        let report = if self.options.dry_run {
            registry.run_streaming(&ctx, out, 5)?
        } else {
            registry.fix_streaming(&ctx, out, 5)?
        };

        result.changed = report.summary.fixed;
        if report.has_errors() {
            result
                .details
                .push(format!("{} error(s) remain", report.summary.errors));
        }
        if report.summary.warnings > 0 {
            result
                .details
                .push(format!("{} warning(s)", report.summary.warnings));
        }
        if result.changed > 0 {
            result.details.push(format!("{} fixed", result.changed));
        }
        Ok(result)
    }

    pub fn identity_doc(&self, out: &mut dyn Write) -> Result<UpgradeStepResult> {
        let mut result = UpgradeStepResult::new("CLAUDE.md sync");
        writeln!(out, "\n  2. Syncing CLAUDE.md from template...")?;

        let expected = render_identity_doc(&self.config.collaborators.fleet)?;
        let state = match identity_state(self.paths, &expected) {
            Ok(state) => state,
            Err(err) => {
                result.details.push(format!("error reading: {err:#}"));
                writeln!(out, "     {FAIL} Could not read CLAUDE.md: {err:#}")?;
                return Ok(result);
            }
        };
        let missing = match state {
            IdentityState::Current => {
                writeln!(out, "     {OK} CLAUDE.md up-to-date")?;
                return Ok(result);
            }
            IdentityState::Missing => true,
            IdentityState::Stale => false,
        };

        if self.options.dry_run {
            let verb = if missing { "would create" } else { "would update" };
            writeln!(out, "     {WARN} CLAUDE.md {verb}")?;
            result.changed = 1;
            return Ok(result);
        }

        if let Err(err) = write_identity_doc(self.paths, &expected) {
            result.details.push(format!("error writing: {err:#}"));
            writeln!(out, "     {FAIL} Could not write CLAUDE.md: {err:#}")?;
            return Ok(result);
        }
        let verb = if missing { "created" } else { "updated" };
        writeln!(out, "     {OK} CLAUDE.md {verb}")?;
        result.changed = 1;

        match ensure_identity_link(self.paths) {
            Ok(true) => {
                writeln!(out, "     {OK} AGENTS.md symlink created")?;
                result.changed += 1;
            }
            Ok(false) => {}
            Err(err) => result
                .details
                .push(format!("AGENTS.md symlink error: {err:#}")),
        }
        Ok(result)
    }

    pub fn daemon_config(&self, out: &mut dyn Write) -> Result<UpgradeStepResult> {
        let mut result = UpgradeStepResult::new("Daemon config");
        writeln!(out, "\n  3. Ensuring daemon.toml lifecycle defaults...")?;

        let path = &self.paths.daemon_config_path;
        match fs::metadata(path) {
            Ok(_) => {
                match load_daemon_config(path) {
                    Ok(_) => writeln!(out, "     {OK} daemon.toml present and valid")?,
                    Err(err) => {
                        result.details.push(format!("invalid config: {err:#}"));
                        writeln!(out, "     {WARN} daemon.toml exists but invalid: {err:#}")?;
                    }
                }
                return Ok(result);
            }
            Err(err) if err.kind() != ErrorKind::NotFound => {
                result.details.push(format!("error checking: {err}"));
                writeln!(out, "     {FAIL} Could not check daemon.toml: {err}")?;
                return Ok(result);
            }
            Err(_) => {}
        }

        if self.options.dry_run {
            writeln!(out, "     {WARN} daemon.toml would create with defaults")?;
            result.changed = 1;
            return Ok(result);
        }
        if let Err(err) = ensure_daemon_config(path) {
            result.details.push(format!("error creating: {err:#}"));
            writeln!(out, "     {FAIL} Could not create daemon.toml: {err:#}")?;
            return Ok(result);
        }
        writeln!(out, "     {OK} daemon.toml created with defaults")?;
        result.changed = 1;
        Ok(result)
    }

    pub fn hooks_sync(&self, out: &mut dyn Write) -> Result<UpgradeStepResult> {
        let mut result = UpgradeStepResult::new("Hooks sync");
        writeln!(out, "\n  4. Syncing hooks to settings.json...")?;

        let sync = HooksSync::new(self.paths);
        let targets = match sync.discover_targets() {
            Ok(targets) => targets,
            Err(err) => {
                result.details.push(format!("discover error: {err}"));
                writeln!(out, "     {FAIL} Could not discover targets: {err}")?;
                return Ok(result);
            }
        };

        let (mut updated, mut created, mut unchanged, mut errors) = (0, 0, 0, 0);
        let dry_run = self.options.dry_run;
        let verbose = self.options.verbose;
        for target in &targets {
            let rel = self.paths.relative(&target.path).display().to_string();
            match sync.sync_target(target, dry_run) {
                Err(err) => {
                    errors += 1;
                    if verbose {
                        writeln!(out, "     {FAIL} {rel}: {err}")?;
                    }
                }
                Ok(SyncOutcome::Created) => {
                    created += 1;
                    if verbose {
                        write_target_line(out, &rel, dry_run, "create", "created")?;
                    }
                }
                Ok(SyncOutcome::Updated) => {
                    updated += 1;
                    if verbose {
                        write_target_line(out, &rel, dry_run, "update", "updated")?;
                    }
                }
                Ok(SyncOutcome::Unchanged) => unchanged += 1,
            }
        }
        result.changed = updated + created;

        let mut parts = Vec::new();
        if updated > 0 {
            parts.push(format!("{updated} updated"));
        }
        if created > 0 {
            parts.push(format!("{created} created"));
        }
        if unchanged > 0 {
            parts.push(format!("{unchanged} unchanged"));
        }
        if errors > 0 {
            parts.push(format!("{errors} errors"));
            result.details.push(format!("{errors} sync errors"));
        }
        let prefix = if result.changed > 0 && dry_run { WARN } else { OK };
        writeln!(out, "     {prefix} settings.json {}", parts.join(", "))?;
        Ok(result)
    }

    pub fn formulas(&self, out: &mut dyn Write) -> Result<UpgradeStepResult> {
        let mut result = UpgradeStepResult::new("Formulas");
        writeln!(out, "\n  5. Updating formulas from embedded copies...")?;

        if self.options.dry_run {
            let health = match self.formulas.check() {
                Ok(health) => health,
                Err(err) => {
                    result.details.push(format!("health check error: {err:#}"));
                    writeln!(out, "     {FAIL} Could not check formulas: {err:#}")?;
                    return Ok(result);
                }
            };
            let needs_update = health.needs_update();
            if needs_update == 0 {
                writeln!(out, "     {OK} {} formulas up-to-date", health.ok)?;
                return Ok(result);
            }
            result.changed = needs_update;
            if health.outdated > 0 {
                result
                    .details
                    .push(format!("{} would update", health.outdated));
            }
            if health.missing > 0 {
                result
                    .details
                    .push(format!("{} would reinstall", health.missing));
            }
            if health.new > 0 {
                result.details.push(format!("{} would install", health.new));
            }
            if health.modified > 0 {
                result.skipped = health.modified;
                result
                    .details
                    .push(format!("{} locally modified (skipped)", health.modified));
            }
            writeln!(out, "     {WARN} formulas: {}", result.details.join(", "))?;
            return Ok(result);
        }

        let update = match self.formulas.update() {
            Ok(update) => update,
            Err(err) => {
                result.details.push(format!("update error: {err:#}"));
                writeln!(out, "     {FAIL} Could not update formulas: {err:#}")?;
                return Ok(result);
            }
        };
        result.changed = update.updated + update.reinstalled;
        result.skipped = update.skipped;

        if result.changed == 0 && result.skipped == 0 {
            let count = self
                .formulas
                .check()
                .map(|health| health.ok + health.modified)
                .unwrap_or_default();
            writeln!(out, "     {OK} {count} formulas up-to-date")?;
            return Ok(result);
        }

        let mut parts = Vec::new();
        if update.updated > 0 {
            parts.push(format!("{} updated", update.updated));
        }
        if update.reinstalled > 0 {
            parts.push(format!("{} reinstalled", update.reinstalled));
        }
        if update.skipped > 0 {
            parts.push(format!("{} skipped (modified)", update.skipped));
        }
        writeln!(out, "     {OK} formulas: {}", parts.join(", "))?;
        Ok(result)
    }
}

fn write_target_line(
    out: &mut dyn Write,
    rel: &str,
    dry_run: bool,
    planned: &str,
    done: &str,
) -> std::io::Result<()> {
    if dry_run {
        writeln!(out, "     {WARN} {rel} (would {planned})")
    } else {
        writeln!(out, "     {OK} {rel} ({done})")
    }
}

pub fn total_changed(results: &[UpgradeStepResult]) -> usize {
    results.iter().map(|result| result.changed).sum()
}

/// `step: detail` for every detail mentioning an error.
pub fn collect_issues(results: &[UpgradeStepResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|result| {
            result
                .details
                .iter()
                .filter(|detail| detail.contains("error"))
                .map(move |detail| format!("{}: {detail}", result.step))
        })
        .collect()
}

pub fn write_summary(
    out: &mut dyn Write,
    results: &[UpgradeStepResult],
    dry_run: bool,
) -> std::io::Result<()> {
    let total = total_changed(results);
    writeln!(out)?;
    match (dry_run, total) {
        (true, 0) => writeln!(out, "  {OK} Workspace is up-to-date — nothing to change")?,
        (true, n) => {
            writeln!(out, "  {WARN} Dry run complete — {n} change(s) would be applied")?;
            writeln!(out, "     Run `warden upgrade` to apply")?;
        }
        (false, 0) => writeln!(out, "  {OK} Workspace is up-to-date")?,
        (false, n) => writeln!(out, "  {OK} Upgrade complete — {n} change(s) applied")?,
    }

    let issues = collect_issues(results);
    if !issues.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {WARN} Issues:")?;
        for issue in issues {
            writeln!(out, "     {ARROW} {issue}")?;
        }
    }
    writeln!(out)
}
