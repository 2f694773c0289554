//! Task tracker adapter: textual record renderings.

use std::process::Command;

use tracing::instrument;

use crate::io::process::{ProcessLimits, query_stdout};

/// Environment override that pins tracker reads to a data branch.
pub const BRANCH_ENV: &str = "BD_DOLT_BRANCH";

pub trait TaskTracker {
    /// Render record `id` as text, optionally pinned to `branch`.
    /// `None` when the record or the tracker is unavailable.
    fn show(&self, id: &str, branch: Option<&str>) -> Option<String>;
}

/// Tracker backed by `<tracker> show <id>`.
#[derive(Debug, Clone)]
pub struct CliTracker {
    program: String,
    limits: ProcessLimits,
}

impl CliTracker {
    pub fn new(program: impl Into<String>, limits: ProcessLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }
}

impl TaskTracker for CliTracker {
    #[instrument(skip_all, fields(id = %id, branch = ?branch))]
    fn show(&self, id: &str, branch: Option<&str>) -> Option<String> {
        if id.is_empty() {
            return None;
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(["show", id]);
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            cmd.env(BRANCH_ENV, branch);
        }
        query_stdout(cmd, &self.limits)
    }
}
