//! Workspace discovery, layout paths and managed-target scanning.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::hooks::{Target, override_file_name};
use crate::error::{SyncError, SyncResult, WorkspaceNotFound};

pub const WARDEN_DIR: &str = ".warden";
pub const RIG_MARKER: &str = "rig.toml";
pub const SETTINGS_RELATIVE: &str = ".claude/settings.json";

/// Town-level roles scanned at the workspace root, in report order.
pub const TOWN_ROLES: [&str; 2] = ["mayor", "deacon"];
/// Single-directory rig roles, in report order.
pub const RIG_ROLES: [&str; 2] = ["witness", "refinery"];
/// Rig roles whose members each get their own settings file.
pub const MEMBER_ROLES: [&str; 2] = ["crew", "polecats"];

/// Filesystem layout of a warden workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub warden_dir: PathBuf,
    pub config_path: PathBuf,
    pub daemon_config_path: PathBuf,
    pub hooks_dir: PathBuf,
    pub base_hooks_path: PathBuf,
    pub overrides_dir: PathBuf,
    pub identity_doc_path: PathBuf,
    pub identity_link_path: PathBuf,
    pub branch_data_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let warden_dir = root.join(WARDEN_DIR);
        let hooks_dir = warden_dir.join("hooks");
        Self {
            root: root.clone(),
            warden_dir: warden_dir.clone(),
            config_path: warden_dir.join("config.toml"),
            daemon_config_path: warden_dir.join("daemon.toml"),
            hooks_dir: hooks_dir.clone(),
            base_hooks_path: hooks_dir.join("base.json"),
            overrides_dir: hooks_dir.join("overrides"),
            identity_doc_path: root.join("CLAUDE.md"),
            identity_link_path: root.join("AGENTS.md"),
            branch_data_dir: root.join(".dolt-data"),
        }
    }

    pub fn override_path(&self, name: &str) -> PathBuf {
        self.overrides_dir.join(override_file_name(name))
    }

    /// Versioned-branch storage root of one rig.
    pub fn rig_data_dir(&self, rig: &str) -> PathBuf {
        self.branch_data_dir.join(rig)
    }

    /// `path` relative to the workspace root, or unchanged when outside it.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Walk from `start` up through its ancestors to the first directory holding `.warden/`.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, WorkspaceNotFound> {
    start
        .ancestors()
        .find(|dir| dir.join(WARDEN_DIR).is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| WorkspaceNotFound {
            start: start.to_path_buf(),
        })
}

/// Enumerate every managed settings destination, in report order.
#[instrument(skip_all, fields(root = %paths.root.display()))]
pub fn discover_targets(paths: &WorkspacePaths) -> SyncResult<Vec<Target>> {
    let root = &paths.root;
    let discovery = |reason: String| SyncError::Discovery {
        root: root.clone(),
        reason,
    };

    let mut targets = Vec::new();
    for role in TOWN_ROLES {
        let dir = root.join(role);
        if dir.is_dir() {
            targets.push(target(&dir, None, role, None));
        }
    }

    for rig in list_rigs(root).map_err(|err| discovery(err.to_string()))? {
        let rig_dir = root.join(&rig);
        for role in RIG_ROLES {
            let dir = rig_dir.join(role);
            if dir.is_dir() {
                targets.push(target(&dir, Some(&rig), role, None));
            }
        }
        for role in MEMBER_ROLES {
            let members =
                sorted_subdirs(&rig_dir.join(role)).map_err(|err| discovery(err.to_string()))?;
            for member in members {
                let dir = rig_dir.join(role).join(&member);
                targets.push(target(&dir, Some(&rig), role, Some(member)));
            }
        }
    }

    debug!(count = targets.len(), "discovered targets");
    Ok(targets)
}

fn target(dir: &Path, rig: Option<&str>, role: &str, member: Option<String>) -> Target {
    Target {
        path: dir.join(SETTINGS_RELATIVE),
        rig: rig.map(str::to_string),
        role: role.to_string(),
        member,
    }
}

/// Non-hidden top-level directories carrying a rig marker, sorted.
fn list_rigs(root: &Path) -> std::io::Result<Vec<String>> {
    Ok(sorted_subdirs(root)?
        .into_iter()
        .filter(|name| !TOWN_ROLES.contains(&name.as_str()))
        .filter(|name| root.join(name).join(RIG_MARKER).is_file())
        .collect())
}

/// Sorted names of non-hidden subdirectories; a missing directory has none.
fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
