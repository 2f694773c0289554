//! Upgrade runs against on-disk workspaces with a canned formula refresher.

use serde_json::json;
use warden::io::config::WardenConfig;
use warden::test_support::{FakeFormulas, TestWorkspace};
use warden::upgrade::{Upgrade, UpgradeOptions, UpgradeStepResult, total_changed};

fn run(ws: &TestWorkspace, dry_run: bool) -> (Vec<UpgradeStepResult>, String) {
    let paths = ws.paths();
    let config = WardenConfig::default();
    let formulas = FakeFormulas::healthy(12);
    let options = UpgradeOptions {
        dry_run,
        ..UpgradeOptions::default()
    };
    let mut out = Vec::new();
    let results = Upgrade::new(&paths, &config, &formulas, options)
        .run(&mut out)
        .expect("upgrade");
    (results, String::from_utf8(out).expect("utf8"))
}

fn step<'a>(results: &'a [UpgradeStepResult], name: &str) -> &'a UpgradeStepResult {
    results
        .iter()
        .find(|result| result.step == name)
        .expect("step present")
}

#[test]
fn missing_daemon_config_is_created_then_left_alone() {
    let ws = TestWorkspace::new();

    let (first, text) = run(&ws, false);
    assert_eq!(step(&first, "Daemon config").changed, 1);
    assert!(text.contains("daemon.toml created with defaults"));
    let written = ws.read(".warden/daemon.toml");

    let (second, text) = run(&ws, false);
    assert_eq!(step(&second, "Daemon config").changed, 0);
    assert!(text.contains("daemon.toml present and valid"));
    assert_eq!(ws.read(".warden/daemon.toml"), written);
}

#[test]
fn steps_run_in_fixed_order() {
    let ws = TestWorkspace::new();
    let (results, text) = run(&ws, true);
    let names: Vec<&str> = results.iter().map(|result| result.step).collect();
    assert_eq!(
        names,
        vec![
            "Structural checks",
            "CLAUDE.md sync",
            "Daemon config",
            "Hooks sync",
            "Formulas"
        ]
    );
    let headers: Vec<usize> = ["  1. ", "  2. ", "  3. ", "  4. ", "  5. "]
        .iter()
        .map(|header| text.find(header).expect("header printed"))
        .collect();
    assert!(headers.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn dry_run_reports_changes_without_writing() {
    let ws = TestWorkspace::new();
    ws.write_json(".warden/hooks/base.json", &json!({"hooks": {}}));
    ws.mkdir(".warden/hooks/overrides");
    ws.mkdir("mayor");

    let (results, text) = run(&ws, true);
    assert_eq!(step(&results, "CLAUDE.md sync").changed, 1);
    assert_eq!(step(&results, "Daemon config").changed, 1);
    assert_eq!(step(&results, "Hooks sync").changed, 1);
    assert!(text.contains("Dry run complete — 3 change(s) would be applied"));
    assert!(!ws.path("CLAUDE.md").exists());
    assert!(!ws.path(".warden/daemon.toml").exists());
    assert!(!ws.path("mayor/.claude/settings.json").exists());
}

#[test]
fn second_apply_is_a_no_op() {
    let ws = TestWorkspace::new();
    ws.rig("gastown");
    ws.mkdir("gastown/witness");
    ws.mkdir("gastown/polecats/furiosa");

    let (first, _) = run(&ws, false);
    assert!(total_changed(&first) > 0);
    assert!(ws.path("gastown/witness/.claude/settings.json").is_file());
    assert!(ws.path("gastown/polecats/furiosa/.claude/settings.json").is_file());

    let (second, text) = run(&ws, false);
    assert_eq!(total_changed(&second), 0, "{second:?}");
    assert!(text.contains("Workspace is up-to-date"));
}

#[test]
fn sync_errors_surface_as_issues() {
    let ws = TestWorkspace::new();
    ws.write_json(".warden/hooks/base.json", &json!({"hooks": {}}));
    ws.mkdir(".warden/hooks/overrides");
    ws.mkdir("mayor/.claude");
    ws.write("mayor/.claude/settings.json", "{ not json");

    let (results, text) = run(&ws, false);
    assert_eq!(step(&results, "Hooks sync").details, vec!["1 sync errors"]);
    assert!(text.contains("Issues:"));
    assert!(text.contains("Hooks sync: 1 sync errors"));
}
