//! Versioned branch store adapter.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument};

use crate::core::branch::parse_branch_listing;
use crate::io::process::{ProcessLimits, query_stdout};

pub trait BranchStore {
    /// Branch names under a rig's storage root; empty on any failure.
    fn list_branches(&self, storage_root: &Path) -> Vec<String>;
}

/// Branch store backed by `<branch_store> branch` run inside the storage root.
#[derive(Debug, Clone)]
pub struct CliBranchStore {
    program: String,
    limits: ProcessLimits,
}

impl CliBranchStore {
    pub fn new(program: impl Into<String>, limits: ProcessLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }
}

impl BranchStore for CliBranchStore {
    #[instrument(skip_all, fields(storage_root = %storage_root.display()))]
    fn list_branches(&self, storage_root: &Path) -> Vec<String> {
        if !storage_root.is_dir() {
            debug!("no storage root");
            return Vec::new();
        }
        let mut cmd = Command::new(&self.program);
        cmd.arg("branch").current_dir(storage_root);
        query_stdout(cmd, &self.limits)
            .map(|stdout| parse_branch_listing(&stdout))
            .unwrap_or_default()
    }
}
