//! Daemon lifecycle config stored under `.warden/daemon.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::io::atomic::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub heartbeat_interval_secs: u64,
    pub patrol_interval_secs: u64,
    pub restart_on_crash: bool,
    pub max_restarts: u32,
    pub drift: DaemonDriftConfig,
}

/// Drift patrol run by the daemon on each patrol tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonDriftConfig {
    pub enabled: bool,
    pub threshold_minutes: u32,
    pub nudge: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 180,
            patrol_interval_secs: 300,
            restart_on_crash: true,
            max_restarts: 5,
            drift: DaemonDriftConfig::default(),
        }
    }
}

impl Default for DaemonDriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_minutes: 5,
            nudge: true,
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(anyhow!("heartbeat_interval_secs must be > 0"));
        }
        if self.patrol_interval_secs == 0 {
            return Err(anyhow!("patrol_interval_secs must be > 0"));
        }
        if self.max_restarts == 0 {
            return Err(anyhow!("max_restarts must be > 0"));
        }
        if self.drift.threshold_minutes == 0 {
            return Err(anyhow!("drift.threshold_minutes must be > 0"));
        }
        Ok(())
    }
}

/// Load and validate an existing daemon config.
pub fn load_daemon_config(path: &Path) -> Result<DaemonConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DaemonConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write daemon config to disk (temp file + rename).
pub fn write_daemon_config(path: &Path, cfg: &DaemonConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize daemon config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Create the daemon config with defaults when absent. Returns `true` if written.
///
/// An existing file is never overwritten, valid or not.
pub fn ensure_daemon_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_daemon_config(path, &DaemonConfig::default())?;
    info!(path = %path.display(), "created daemon config with defaults");
    Ok(true)
}
