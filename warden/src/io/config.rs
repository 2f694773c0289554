//! Warden configuration stored under `.warden/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Warden configuration (TOML).
///
/// Human-edited; every field is optional and falls back to its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WardenConfig {
    pub collaborators: CollaboratorConfig,
    pub drift: DriftConfig,
}

/// External programs warden shells out to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Fleet directory: rig/polecat listing, peek, nudge, formulas.
    pub fleet: String,
    /// Task tracker used to render records and steps.
    pub tracker: String,
    /// Terminal session manager.
    pub session: String,
    /// Versioned branch store.
    pub branch_store: String,
    /// Per-invocation timeout; 0 blocks until the collaborator exits.
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            fleet: "gt".to_string(),
            tracker: "bd".to_string(),
            session: "tmux".to_string(),
            branch_store: "dolt".to_string(),
            timeout_secs: 0,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl CollaboratorConfig {
    /// `(role, program)` pairs in a stable order.
    pub fn programs(&self) -> [(&'static str, &str); 4] {
        [
            ("fleet", self.fleet.as_str()),
            ("tracker", self.tracker.as_str()),
            ("session", self.session.as_str()),
            ("branch_store", self.branch_store.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriftConfig {
    pub threshold_minutes: u32,
    pub watch_interval_secs: u64,
    /// Session output lines shown per worker in the human report.
    pub peek_lines: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold_minutes: 5,
            watch_interval_secs: 30,
            peek_lines: 20,
        }
    }
}

impl WardenConfig {
    pub fn validate(&self) -> Result<()> {
        for (role, program) in self.collaborators.programs() {
            if program.trim().is_empty() {
                return Err(anyhow!("collaborators.{role} must be non-empty"));
            }
        }
        if self.collaborators.output_limit_bytes == 0 {
            return Err(anyhow!("collaborators.output_limit_bytes must be > 0"));
        }
        if self.drift.watch_interval_secs == 0 {
            return Err(anyhow!("drift.watch_interval_secs must be > 0"));
        }
        if self.drift.peek_lines == 0 {
            return Err(anyhow!("drift.peek_lines must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WardenConfig::default()`.
pub fn load_config(path: &Path) -> Result<WardenConfig> {
    if !path.exists() {
        let cfg = WardenConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WardenConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
