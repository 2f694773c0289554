//! Typed failures that callers classify rather than just report.

use std::path::PathBuf;

use thiserror::Error;

/// No `.warden/` directory was found in the start directory or its ancestors.
#[derive(Debug, Error)]
#[error("not in a warden workspace (no .warden/ found from {start})")]
pub struct WorkspaceNotFound {
    pub start: PathBuf,
}

/// Failure classes of the hooks sync engine.
///
/// Listing and checks map every variant to a per-target `error` status.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("discover targets under {root}: {reason}")]
    Discovery { root: PathBuf, reason: String },

    #[error("compute expected hooks from {source_name}: {reason}")]
    Compute { source_name: String, reason: String },

    #[error("load settings {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("write settings {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

pub type SyncResult<T> = Result<T, SyncError>;
