//! Override-chain sync engine: expected hooks per target and reconciliation to disk.

use std::fs;

use tracing::{debug, info, instrument, warn};

use crate::core::hooks::{
    Hooks, SyncOutcome, SyncStatus, Target, applicable_overrides, merge_layers,
    override_name_from_stem,
};
use crate::error::{SyncError, SyncResult};
use crate::io::settings::{SettingsDoc, load_hooks_layer, load_settings, write_settings};
use crate::io::workspace::{WorkspacePaths, discover_targets};

/// Counts from syncing a set of targets.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: Vec<Target>,
    pub updated: Vec<Target>,
    pub unchanged: usize,
    pub errors: Vec<(Target, SyncError)>,
}

impl SyncReport {
    /// Targets written (or that would be written under dry-run).
    pub fn changed(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Sync engine bound to one workspace.
#[derive(Debug, Clone, Copy)]
pub struct HooksSync<'a> {
    paths: &'a WorkspacePaths,
}

impl<'a> HooksSync<'a> {
    pub fn new(paths: &'a WorkspacePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &WorkspacePaths {
        self.paths
    }

    pub fn discover_targets(&self) -> SyncResult<Vec<Target>> {
        discover_targets(self.paths)
    }

    /// Applicable overrides whose file exists, lowest precedence first.
    pub fn active_overrides(&self, key: &str) -> Vec<String> {
        applicable_overrides(key)
            .into_iter()
            .filter(|name| self.paths.override_path(name).is_file())
            .collect()
    }

    /// Base hooks merged with every active override for `key`.
    #[instrument(skip_all, fields(key = %key))]
    pub fn compute_expected(&self, key: &str) -> SyncResult<Hooks> {
        let base = load_hooks_layer(&self.paths.base_hooks_path, "base")?.unwrap_or_default();
        let mut layers = Vec::new();
        for name in applicable_overrides(key) {
            let source = format!("override {name}");
            if let Some(layer) = load_hooks_layer(&self.paths.override_path(&name), &source)? {
                layers.push(layer);
            }
        }
        debug!(layers = layers.len(), "merged override chain");
        Ok(merge_layers(&base, &layers))
    }

    /// Classify a target; load/compute failures become `error`.
    pub fn status(&self, target: &Target) -> SyncStatus {
        if !target.path.exists() {
            return SyncStatus::Missing;
        }
        let expected = match self.compute_expected(&target.key()) {
            Ok(expected) => expected,
            Err(err) => {
                warn!(target = %target.identity(), err = %err, "cannot compute expected hooks");
                return SyncStatus::Error;
            }
        };
        match load_settings(&target.path) {
            Ok(settings) => SyncStatus::classify(Some(&settings.hooks()), &expected),
            Err(err) => {
                warn!(target = %target.identity(), err = %err, "cannot load settings");
                SyncStatus::Error
            }
        }
    }

    /// Bring one target in line with its expected hooks.
    ///
    /// An in-sync target is never written. Under `dry_run` nothing is written.
    #[instrument(skip_all, fields(target = %target.identity(), dry_run = dry_run))]
    pub fn sync_target(&self, target: &Target, dry_run: bool) -> SyncResult<SyncOutcome> {
        let expected = self.compute_expected(&target.key())?;
        let (mut settings, outcome) = if target.path.exists() {
            let settings = load_settings(&target.path)?;
            if settings.hooks() == expected {
                debug!("already in sync");
                return Ok(SyncOutcome::Unchanged);
            }
            (settings, SyncOutcome::Updated)
        } else {
            (SettingsDoc::default(), SyncOutcome::Created)
        };

        if !dry_run {
            settings.set_hooks(&expected);
            write_settings(&target.path, &settings)?;
            info!(outcome = ?outcome, path = %target.path.display(), "wrote settings");
        }
        Ok(outcome)
    }

    /// Sync every target in order; per-target failures are collected, not fatal.
    pub fn sync_all(&self, targets: &[Target], dry_run: bool) -> SyncReport {
        let mut report = SyncReport::default();
        for target in targets {
            match self.sync_target(target, dry_run) {
                Ok(SyncOutcome::Created) => report.created.push(target.clone()),
                Ok(SyncOutcome::Updated) => report.updated.push(target.clone()),
                Ok(SyncOutcome::Unchanged) => report.unchanged += 1,
                Err(err) => {
                    warn!(target = %target.identity(), err = %err, "sync failed");
                    report.errors.push((target.clone(), err));
                }
            }
        }
        report
    }

    /// Override names present on disk, sorted by file name.
    pub fn override_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.paths.overrides_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|ty| !ty.is_dir()))
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                file_name.strip_suffix(".json").map(override_name_from_stem)
            })
            .collect();
        names.sort();
        names
    }
}
