//! Fleet directory adapter: rig and active-worker listings.

use std::process::Command;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::io::process::{ProcessLimits, query_stdout};

/// One worker as listed by the fleet directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolecatInfo {
    pub rig: String,
    pub name: String,
    pub state: String,
    /// Task record the worker is assigned to; empty when unassigned.
    pub task_id: String,
}

/// Source of rigs and their active workers.
///
/// Implementations degrade: any failure yields an empty list for that scope.
pub trait FleetDirectory {
    fn list_rigs(&self) -> Vec<String>;
    fn list_workers(&self, rig: &str) -> Vec<PolecatInfo>;

    /// Every worker across every rig, in listing order.
    fn list_all_workers(&self) -> Vec<PolecatInfo> {
        self.list_rigs()
            .iter()
            .flat_map(|rig| self.list_workers(rig))
            .collect()
    }
}

/// Fleet directory backed by `<fleet> rig list --json` / `<fleet> polecat list <rig> --json`.
#[derive(Debug, Clone)]
pub struct CliFleet {
    program: String,
    limits: ProcessLimits,
}

impl CliFleet {
    pub fn new(program: impl Into<String>, limits: ProcessLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }
}

impl FleetDirectory for CliFleet {
    #[instrument(skip_all)]
    fn list_rigs(&self) -> Vec<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["rig", "list", "--json"]);
        let Some(stdout) = query_stdout(cmd, &self.limits) else {
            return Vec::new();
        };
        parse_rig_list(&stdout)
    }

    #[instrument(skip_all, fields(rig = %rig))]
    fn list_workers(&self, rig: &str) -> Vec<PolecatInfo> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["polecat", "list", rig, "--json"]);
        let Some(stdout) = query_stdout(cmd, &self.limits) else {
            return Vec::new();
        };
        parse_polecat_list(&stdout, rig)
    }
}

#[derive(Deserialize)]
struct RigEntry {
    name: String,
}

#[derive(Deserialize)]
struct PolecatEntry {
    #[serde(default)]
    rig: String,
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    issue: String,
}

/// Parse `rig list --json`; malformed output degrades to no rigs.
pub fn parse_rig_list(json: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<RigEntry>>(json) {
        Ok(entries) => entries.into_iter().map(|entry| entry.name).collect(),
        Err(err) => {
            warn!(err = %err, "unparseable rig listing");
            Vec::new()
        }
    }
}

/// Parse `polecat list <rig> --json`; an empty `rig` field means `queried_rig`.
pub fn parse_polecat_list(json: &str, queried_rig: &str) -> Vec<PolecatInfo> {
    match serde_json::from_str::<Vec<PolecatEntry>>(json) {
        Ok(entries) => {
            debug!(rig = queried_rig, count = entries.len(), "listed polecats");
            entries
                .into_iter()
                .map(|entry| PolecatInfo {
                    rig: if entry.rig.is_empty() {
                        queried_rig.to_string()
                    } else {
                        entry.rig
                    },
                    name: entry.name,
                    state: entry.state,
                    task_id: entry.issue,
                })
                .collect()
        }
        Err(err) => {
            warn!(rig = queried_rig, err = %err, "unparseable polecat listing");
            Vec::new()
        }
    }
}
