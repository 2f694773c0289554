//! Built-in workspace health checks.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::checks::{Check, CheckContext};
use crate::core::hooks::{SyncStatus, applicable_overrides};
use crate::core::report::{CheckResult, Severity};
use crate::io::atomic::write_atomic;
use crate::io::daemon_config::{ensure_daemon_config, load_daemon_config};
use crate::io::identity::{
    IdentityState, ensure_identity_link, identity_state, link_present, render_identity_doc,
    write_identity_doc,
};
use crate::io::settings::load_hooks_layer;
use crate::sync::HooksSync;

const EMPTY_BASE_HOOKS: &str = "{\n  \"hooks\": {}\n}\n";

/// Every built-in check, in dependency order.
pub fn workspace_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(WorkspaceLayoutCheck),
        Box::new(BaseHooksCheck),
        Box::new(DaemonConfigCheck),
        Box::new(IdentityDocCheck),
        Box::new(HooksSyncCheck),
        Box::new(StaleOverridesCheck),
        Box::new(CollaboratorBinariesCheck),
    ]
}

/// Checks that repair structure only, leaving identity, daemon config and
/// hooks to the dedicated upgrade steps.
pub fn structural_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(WorkspaceLayoutCheck),
        Box::new(BaseHooksCheck),
        Box::new(StaleOverridesCheck),
        Box::new(CollaboratorBinariesCheck),
    ]
}

pub struct WorkspaceLayoutCheck;

impl WorkspaceLayoutCheck {
    fn required_dirs<'a>(ctx: &CheckContext<'a>) -> [&'a Path; 3] {
        [
            ctx.paths.warden_dir.as_path(),
            ctx.paths.hooks_dir.as_path(),
            ctx.paths.overrides_dir.as_path(),
        ]
    }
}

impl Check for WorkspaceLayoutCheck {
    fn name(&self) -> &str {
        "workspace-layout"
    }

    fn description(&self) -> &str {
        "warden state directories exist"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let missing: Vec<String> = Self::required_dirs(ctx)
            .into_iter()
            .filter(|dir| !dir.is_dir())
            .map(|dir| ctx.paths.relative(dir).display().to_string())
            .collect();
        if missing.is_empty() {
            CheckResult::ok(self.name(), "layout complete")
        } else {
            CheckResult::failing(
                self.name(),
                self.severity(),
                format!("missing {}", missing.join(", ")),
            )
        }
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, ctx: &CheckContext<'_>) -> Result<()> {
        for dir in Self::required_dirs(ctx) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub struct BaseHooksCheck;

impl Check for BaseHooksCheck {
    fn name(&self) -> &str {
        "base-hooks"
    }

    fn description(&self) -> &str {
        "base hooks file exists and matches the hooks schema"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        match load_hooks_layer(&ctx.paths.base_hooks_path, "base") {
            Ok(Some(hooks)) => CheckResult::ok(
                self.name(),
                format!("{} event(s) configured", hooks.events().len()),
            ),
            Ok(None) => CheckResult::failing(self.name(), self.severity(), "base hooks missing"),
            Err(err) => CheckResult::failing(self.name(), self.severity(), err.to_string()),
        }
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, ctx: &CheckContext<'_>) -> Result<()> {
        let path = &ctx.paths.base_hooks_path;
        if path.exists() {
            bail!("{} is malformed; edit it by hand", path.display());
        }
        write_atomic(path, EMPTY_BASE_HOOKS)
    }
}

pub struct DaemonConfigCheck;

impl Check for DaemonConfigCheck {
    fn name(&self) -> &str {
        "daemon-config"
    }

    fn description(&self) -> &str {
        "daemon lifecycle config exists and validates"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let path = &ctx.paths.daemon_config_path;
        if !path.exists() {
            return CheckResult::failing(self.name(), self.severity(), "daemon config missing");
        }
        match load_daemon_config(path) {
            Ok(_) => CheckResult::ok(self.name(), "present and valid"),
            Err(err) => CheckResult::failing(
                self.name(),
                self.severity(),
                format!("invalid config: {err:#}"),
            ),
        }
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, ctx: &CheckContext<'_>) -> Result<()> {
        let path = &ctx.paths.daemon_config_path;
        if !ensure_daemon_config(path)? {
            bail!("{} exists but is invalid; not overwriting", path.display());
        }
        Ok(())
    }
}

pub struct IdentityDocCheck;

impl Check for IdentityDocCheck {
    fn name(&self) -> &str {
        "identity-doc"
    }

    fn description(&self) -> &str {
        "CLAUDE.md matches the embedded template and AGENTS.md links to it"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let state = render_identity_doc(&ctx.config.collaborators.fleet)
            .and_then(|expected| identity_state(ctx.paths, &expected));
        let mut problems = Vec::new();
        match state {
            Ok(IdentityState::Current) => {}
            Ok(IdentityState::Stale) => problems.push("CLAUDE.md out of date".to_string()),
            Ok(IdentityState::Missing) => problems.push("CLAUDE.md missing".to_string()),
            Err(err) => return CheckResult::error(self.name(), format!("{err:#}")),
        }
        if !link_present(ctx.paths) {
            problems.push("AGENTS.md link missing".to_string());
        }
        if problems.is_empty() {
            CheckResult::ok(self.name(), "up-to-date")
        } else {
            CheckResult::failing(self.name(), self.severity(), problems.join(", "))
        }
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, ctx: &CheckContext<'_>) -> Result<()> {
        let expected = render_identity_doc(&ctx.config.collaborators.fleet)?;
        if identity_state(ctx.paths, &expected)? != IdentityState::Current {
            write_identity_doc(ctx.paths, &expected)?;
        }
        ensure_identity_link(ctx.paths)?;
        Ok(())
    }
}

pub struct HooksSyncCheck;

impl Check for HooksSyncCheck {
    fn name(&self) -> &str {
        "hooks-sync"
    }

    fn description(&self) -> &str {
        "every managed settings.json matches base hooks plus overrides"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let sync = HooksSync::new(ctx.paths);
        let targets = match sync.discover_targets() {
            Ok(targets) => targets,
            Err(err) => return CheckResult::error(self.name(), err.to_string()),
        };
        let drifted: Vec<String> = targets
            .iter()
            .filter_map(|target| match sync.status(target) {
                SyncStatus::InSync => None,
                status => Some(format!("{}: {status}", target.identity())),
            })
            .collect();
        if drifted.is_empty() {
            return CheckResult::ok(
                self.name(),
                format!("{} target(s) in sync", targets.len()),
            );
        }
        CheckResult::failing(
            self.name(),
            self.severity(),
            format!(
                "{} of {} target(s) not in sync",
                drifted.len(),
                targets.len()
            ),
        )
        .with_details(drifted)
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn fix(&self, ctx: &CheckContext<'_>) -> Result<()> {
        let sync = HooksSync::new(ctx.paths);
        let targets = sync.discover_targets()?;
        let report = sync.sync_all(&targets, false);
        if let Some((target, err)) = report.errors.first() {
            bail!(
                "{} sync error(s), first at {}: {err}",
                report.errors.len(),
                target.identity()
            );
        }
        Ok(())
    }
}

pub struct StaleOverridesCheck;

impl Check for StaleOverridesCheck {
    fn name(&self) -> &str {
        "stale-overrides"
    }

    fn description(&self) -> &str {
        "every override file applies to at least one discovered target"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let sync = HooksSync::new(ctx.paths);
        let targets = match sync.discover_targets() {
            Ok(targets) => targets,
            Err(err) => return CheckResult::error(self.name(), err.to_string()),
        };
        let applicable: Vec<String> = targets
            .iter()
            .flat_map(|target| applicable_overrides(&target.key()))
            .collect();
        let stale: Vec<String> = sync
            .override_files()
            .into_iter()
            .filter(|name| !applicable.contains(name))
            .collect();
        if stale.is_empty() {
            CheckResult::ok(self.name(), "no stale overrides")
        } else {
            CheckResult::failing(
                self.name(),
                self.severity(),
                format!("override(s) match no target: {}", stale.join(", ")),
            )
        }
    }
}

pub struct CollaboratorBinariesCheck;

impl Check for CollaboratorBinariesCheck {
    fn name(&self) -> &str {
        "collaborator-binaries"
    }

    fn description(&self) -> &str {
        "configured fleet, tracker, session and branch-store programs are installed"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckResult {
        let search_path = env::var_os("PATH").unwrap_or_default();
        let dirs: Vec<PathBuf> = env::split_paths(&search_path).collect();
        let missing: Vec<String> = ctx
            .config
            .collaborators
            .programs()
            .into_iter()
            .filter(|(_, program)| resolve_program(program, &dirs).is_none())
            .map(|(role, program)| format!("{role} ({program})"))
            .collect();
        if missing.is_empty() {
            CheckResult::ok(self.name(), "all collaborators found")
        } else {
            CheckResult::failing(
                self.name(),
                self.severity(),
                format!("not found: {}", missing.join(", ")),
            )
        }
    }
}

/// Resolve `program` the way a spawn would: paths are taken as-is, bare
/// names are searched in `dirs`.
pub fn resolve_program(program: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        return as_path.is_file().then(|| as_path.to_path_buf());
    }
    let found = dirs
        .iter()
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file());
    debug!(program, found = ?found, "resolved collaborator");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckRegistry;
    use crate::core::report::CheckStatus;
    use crate::io::config::WardenConfig;
    use crate::io::workspace::WorkspacePaths;
    use crate::test_support::TestWorkspace;
    use serde_json::json;

    fn context_for<'a>(paths: &'a WorkspacePaths, config: &'a WardenConfig) -> CheckContext<'a> {
        CheckContext {
            paths,
            config,
            verbose: false,
            no_start: false,
        }
    }

    fn fix_fresh_workspace(no_start: bool) -> Vec<(String, CheckStatus)> {
        let ws = TestWorkspace::new();
        ws.mkdir("mayor");
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = CheckContext {
            no_start,
            ..context_for(&paths, &config)
        };
        let mut registry = CheckRegistry::new();
        registry.register_all(workspace_checks());
        registry
            .fix(&ctx)
            .results
            .into_iter()
            .map(|result| (result.name, result.status))
            .collect()
    }

    #[test]
    fn no_start_does_not_change_builtin_fixes() {
        assert_eq!(fix_fresh_workspace(true), fix_fresh_workspace(false));
    }

    #[test]
    fn layout_fix_creates_directories() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);

        let result = WorkspaceLayoutCheck.run(&ctx);
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.message.contains(".warden/hooks"));
        WorkspaceLayoutCheck.fix(&ctx).expect("fix");
        assert_eq!(WorkspaceLayoutCheck.run(&ctx).status, CheckStatus::Ok);
    }

    #[test]
    fn base_hooks_fix_only_creates_missing_file() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);

        assert_eq!(BaseHooksCheck.run(&ctx).status, CheckStatus::Error);
        BaseHooksCheck.fix(&ctx).expect("fix");
        assert_eq!(BaseHooksCheck.run(&ctx).status, CheckStatus::Ok);

        ws.write(".warden/hooks/base.json", r#"{"hooks": {"Stop": 3}}"#);
        assert_eq!(BaseHooksCheck.run(&ctx).status, CheckStatus::Error);
        assert!(BaseHooksCheck.fix(&ctx).is_err());
    }

    #[test]
    fn daemon_config_fix_never_overwrites_invalid_file() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);

        assert_eq!(DaemonConfigCheck.run(&ctx).status, CheckStatus::Error);
        DaemonConfigCheck.fix(&ctx).expect("create");
        assert_eq!(DaemonConfigCheck.run(&ctx).status, CheckStatus::Ok);

        ws.write(".warden/daemon.toml", "patrol_interval_secs = 0\n");
        let result = DaemonConfigCheck.run(&ctx);
        assert!(result.message.starts_with("invalid config"));
        assert!(DaemonConfigCheck.fix(&ctx).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn identity_fix_writes_doc_and_link() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);

        let result = IdentityDocCheck.run(&ctx);
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.message, "CLAUDE.md missing, AGENTS.md link missing");
        IdentityDocCheck.fix(&ctx).expect("fix");
        assert_eq!(IdentityDocCheck.run(&ctx).status, CheckStatus::Ok);
    }

    #[test]
    fn hooks_sync_check_lists_drifted_targets() {
        let ws = TestWorkspace::new();
        ws.mkdir("mayor");
        ws.write_json(".warden/hooks/base.json", &json!({"hooks": {}}));
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);

        let result = HooksSyncCheck.run(&ctx);
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.details, vec!["mayor: missing"]);
        HooksSyncCheck.fix(&ctx).expect("fix");
        assert_eq!(HooksSyncCheck.run(&ctx).status, CheckStatus::Ok);
    }

    #[test]
    fn stale_overrides_are_reported() {
        let ws = TestWorkspace::new();
        ws.mkdir("mayor");
        ws.write_json(".warden/hooks/overrides/mayor.json", &json!({"hooks": {}}));
        ws.write_json(".warden/hooks/overrides/oldrig__crew.json", &json!({"hooks": {}}));
        let paths = ws.paths();
        let config = WardenConfig::default();

        let result = StaleOverridesCheck.run(&context_for(&paths, &config));
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.message, "override(s) match no target: oldrig/crew");
        assert!(!StaleOverridesCheck.can_fix());
    }

    #[cfg(unix)]
    #[test]
    fn resolves_programs_on_search_path_or_by_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let program = temp.path().join("gt");
        fs::write(&program, "").expect("write");
        let dirs = vec![temp.path().to_path_buf()];

        assert_eq!(resolve_program("gt", &dirs), Some(program.clone()));
        assert_eq!(resolve_program("bd", &dirs), None);
        assert_eq!(
            resolve_program(&program.display().to_string(), &[]),
            Some(program)
        );
    }

    #[test]
    fn second_fix_pass_fixes_nothing() {
        let ws = TestWorkspace::new();
        ws.mkdir("mayor");
        let paths = ws.paths();
        let config = WardenConfig::default();
        let ctx = context_for(&paths, &config);
        let mut registry = CheckRegistry::new();
        registry.register_all(workspace_checks());

        let first = registry.fix(&ctx);
        assert!(first.summary.fixed >= 4);
        let second = registry.fix(&ctx);
        assert_eq!(second.summary.fixed, 0);
    }
}
