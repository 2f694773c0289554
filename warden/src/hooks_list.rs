//! `warden hooks list`: managed settings locations and their sync status.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::hooks::{SyncStatus, Target};
use crate::error::SyncResult;
use crate::sync::HooksSync;

const TARGET_WIDTH_CAP: usize = 30;
const OVERRIDES_WIDTH_CAP: usize = 35;

/// One listed group row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    pub target: String,
    pub overrides: Vec<String>,
    pub status: SyncStatus,
    pub path: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HooksListing {
    pub targets: Vec<TargetInfo>,
    pub base_path: String,
    pub overrides_dir: String,
    #[serde(skip)]
    pub base_exists: bool,
    #[serde(skip)]
    pub override_file_count: usize,
}

/// Build the listing: one row per display key, first target of each group.
pub fn list_targets(sync: &HooksSync<'_>) -> SyncResult<HooksListing> {
    let paths = sync.paths();
    let targets = sync.discover_targets()?;
    let infos = dedupe_by_display_key(targets)
        .iter()
        .map(|target| target_info(sync, target))
        .collect();
    Ok(HooksListing {
        targets: infos,
        base_path: paths.base_hooks_path.display().to_string(),
        overrides_dir: paths.overrides_dir.display().to_string(),
        base_exists: paths.base_hooks_path.exists(),
        override_file_count: sync.override_files().len(),
    })
}

fn dedupe_by_display_key(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.display_key()))
        .collect()
}

fn target_info(sync: &HooksSync<'_>, target: &Target) -> TargetInfo {
    TargetInfo {
        target: target.display_key(),
        overrides: sync.active_overrides(&target.key()),
        status: sync.status(target),
        path: target.path.display().to_string(),
        exists: target.path.exists(),
    }
}

pub fn render_json(listing: &HooksListing) -> serde_json::Result<String> {
    serde_json::to_string_pretty(listing)
}

pub fn render_human(listing: &HooksListing) -> String {
    let target_width = listing
        .targets
        .iter()
        .map(|info| info.target.chars().count())
        .chain(["Target".len()])
        .max()
        .unwrap_or(0)
        .min(TARGET_WIDTH_CAP);
    let overrides_width = listing
        .targets
        .iter()
        .map(|info| format_overrides(&info.overrides).chars().count())
        .chain(["Overrides".len()])
        .max()
        .unwrap_or(0)
        .min(OVERRIDES_WIDTH_CAP);

    let mut out = format!(
        "{:<target_width$}  {:<overrides_width$}  Status\n",
        "Target", "Overrides"
    );
    for info in &listing.targets {
        out.push_str(&format!(
            "{:<target_width$}  {:<overrides_width$}  {}\n",
            info.target,
            format_overrides(&info.overrides),
            status_label(info.status)
        ));
    }

    let base_state = if listing.base_exists {
        "exists"
    } else {
        "not found"
    };
    out.push('\n');
    out.push_str(&format!(
        "Base config: {} ({base_state})\n",
        listing.base_path
    ));
    out.push_str(&format!(
        "Overrides:   {} ({} files)\n",
        listing.overrides_dir, listing.override_file_count
    ));
    out
}

fn format_overrides(overrides: &[String]) -> String {
    if overrides.is_empty() {
        "(none)".to_string()
    } else {
        format!("[{}]", overrides.join(", "))
    }
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::InSync => "✓ in sync",
        SyncStatus::OutOfSync => "⚠ out of sync",
        SyncStatus::Missing => "- missing",
        SyncStatus::Error => "✖ error",
    }
}
