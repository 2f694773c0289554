//! `warden doctor`: run every workspace check, optionally fixing.

use std::io::Write;

use anyhow::Result;

use crate::checks::{CheckContext, CheckRegistry, workspace_checks};
use crate::core::report::{Report, Summary};
use crate::io::config::WardenConfig;
use crate::io::workspace::WorkspacePaths;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoctorOptions {
    pub fix: bool,
    pub verbose: bool,
    pub no_start: bool,
}

/// Stream one line per check to `out`, then the summary line.
pub fn run_doctor(
    paths: &WorkspacePaths,
    config: &WardenConfig,
    options: DoctorOptions,
    out: &mut dyn Write,
) -> Result<Report> {
    let mut registry = CheckRegistry::new();
    registry.register_all(workspace_checks());
    let ctx = CheckContext {
        paths,
        config,
        verbose: options.verbose,
        no_start: options.no_start,
    };

    writeln!(out, "warden doctor")?;
    let report = if options.fix {
        registry.fix_streaming(&ctx, out, 2)?
    } else {
        registry.run_streaming(&ctx, out, 2)?
    };
    writeln!(out)?;
    writeln!(out, "{}", summary_line(&report.summary))?;
    Ok(report)
}

pub fn summary_line(summary: &Summary) -> String {
    format!(
        "{} ok, {} fixed, {} warning(s), {} error(s)",
        summary.ok, summary.fixed, summary.warnings, summary.errors
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;

    #[test]
    fn fix_settles_a_bare_workspace() {
        let ws = TestWorkspace::new();
        let paths = ws.paths();
        let config = WardenConfig::default();
        let fix = DoctorOptions {
            fix: true,
            ..DoctorOptions::default()
        };

        let first = run_doctor(&paths, &config, fix, &mut Vec::new()).expect("fix");
        assert!(first.fixed_count() >= 3);
        assert!(paths.base_hooks_path.is_file());
        assert!(paths.daemon_config_path.is_file());
        assert!(paths.identity_doc_path.is_file());

        let mut out = Vec::new();
        let second =
            run_doctor(&paths, &config, DoctorOptions::default(), &mut out).expect("check");
        assert_eq!(second.fixed_count(), 0);
        let failing: Vec<_> = second
            .results
            .iter()
            .filter(|result| result.status.needs_fix())
            .map(|result| result.name.as_str())
            .collect();
        assert!(
            failing.iter().all(|name| *name == "collaborator-binaries"),
            "{failing:?}"
        );
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("warden doctor\n  ✓ workspace-layout: "));
    }

    #[test]
    fn summary_line_counts_each_status() {
        let summary = Summary {
            ok: 4,
            fixed: 1,
            warnings: 2,
            errors: 0,
        };
        assert_eq!(
            summary_line(&summary),
            "4 ok, 1 fixed, 2 warning(s), 0 error(s)"
        );
    }
}
