//! Test-only fakes for collaborators and an on-disk workspace builder.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde_json::Value;
use tempfile::TempDir;

use crate::io::branches::BranchStore;
use crate::io::fleet::{FleetDirectory, PolecatInfo};
use crate::io::formulas::{FormulaHealth, FormulaRefresher, FormulaUpdate};
use crate::io::sessions::SessionManager;
use crate::io::tracker::TaskTracker;
use crate::io::workspace::{RIG_MARKER, WARDEN_DIR, WorkspacePaths};

/// A temporary workspace root containing `.warden/`.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(WARDEN_DIR)).expect("create .warden");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> WorkspacePaths {
        WorkspacePaths::new(self.root())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.path(rel)).expect("mkdir");
    }

    /// Create a rig directory with its marker file.
    pub fn rig(&self, name: &str) {
        self.write(&format!("{name}/{RIG_MARKER}"), "");
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parent");
        }
        fs::write(path, contents).expect("write");
    }

    pub fn write_json(&self, rel: &str, value: &Value) {
        let mut buf = serde_json::to_string_pretty(value).expect("serialize");
        buf.push('\n');
        self.write(rel, &buf);
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn polecat(rig: &str, name: &str, state: &str, task_id: &str) -> PolecatInfo {
    PolecatInfo {
        rig: rig.to_string(),
        name: name.to_string(),
        state: state.to_string(),
        task_id: task_id.to_string(),
    }
}

/// Fleet directory with canned rigs, in insertion order.
#[derive(Default)]
pub struct FakeFleet {
    rigs: Vec<(String, Vec<PolecatInfo>)>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rig(mut self, rig: &str, workers: Vec<PolecatInfo>) -> Self {
        self.rigs.push((rig.to_string(), workers));
        self
    }
}

impl FleetDirectory for FakeFleet {
    fn list_rigs(&self) -> Vec<String> {
        self.rigs.iter().map(|(rig, _)| rig.clone()).collect()
    }

    fn list_workers(&self, rig: &str) -> Vec<PolecatInfo> {
        self.rigs
            .iter()
            .find(|(name, _)| name == rig)
            .map(|(_, workers)| workers.clone())
            .unwrap_or_default()
    }
}

/// Session manager with canned creation times and output; records nudges.
#[derive(Default)]
pub struct FakeSessions {
    created: HashMap<String, i64>,
    peeks: HashMap<String, String>,
    fail_nudges: bool,
    nudges: RefCell<Vec<(String, String)>>,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created(mut self, session: &str, created: i64) -> Self {
        self.created.insert(session.to_string(), created);
        self
    }

    pub fn with_peek(mut self, address: &str, output: &str) -> Self {
        self.peeks.insert(address.to_string(), output.to_string());
        self
    }

    pub fn failing_nudges(mut self) -> Self {
        self.fail_nudges = true;
        self
    }

    /// `(address, message)` pairs in send order.
    pub fn nudges(&self) -> Vec<(String, String)> {
        self.nudges.borrow().clone()
    }
}

impl SessionManager for FakeSessions {
    fn created_at(&self, session: &str) -> Option<i64> {
        self.created.get(session).copied()
    }

    fn peek(&self, address: &str, _lines: usize) -> Option<String> {
        self.peeks.get(address).cloned()
    }

    fn nudge(&self, address: &str, message: &str) -> Result<()> {
        self.nudges
            .borrow_mut()
            .push((address.to_string(), message.to_string()));
        if self.fail_nudges {
            bail!("session {address} not found");
        }
        Ok(())
    }
}

/// Branch store keyed by rig (the storage root's directory name).
#[derive(Default)]
pub struct FakeBranches {
    by_rig: HashMap<String, Vec<String>>,
}

impl FakeBranches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches(mut self, rig: &str, branches: &[&str]) -> Self {
        self.by_rig.insert(
            rig.to_string(),
            branches.iter().map(|b| b.to_string()).collect(),
        );
        self
    }
}

impl BranchStore for FakeBranches {
    fn list_branches(&self, storage_root: &Path) -> Vec<String> {
        storage_root
            .file_name()
            .and_then(|name| self.by_rig.get(name.to_string_lossy().as_ref()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Tracker with renderings keyed by record id and pinned branch.
#[derive(Default)]
pub struct FakeTracker {
    records: HashMap<(String, Option<String>), String>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, id: &str, branch: Option<&str>, rendering: &str) -> Self {
        self.records.insert(
            (id.to_string(), branch.map(str::to_string)),
            rendering.to_string(),
        );
        self
    }
}

impl TaskTracker for FakeTracker {
    fn show(&self, id: &str, branch: Option<&str>) -> Option<String> {
        self.records
            .get(&(id.to_string(), branch.map(str::to_string)))
            .cloned()
    }
}

/// Formula refresher returning canned reports; `None` means the call fails.
#[derive(Default)]
pub struct FakeFormulas {
    health: Option<FormulaHealth>,
    update: Option<FormulaUpdate>,
    updates: RefCell<usize>,
}

impl FakeFormulas {
    /// Every formula up to date; updating changes nothing.
    pub fn healthy(ok: usize) -> Self {
        Self::default()
            .with_health(FormulaHealth {
                ok,
                ..FormulaHealth::default()
            })
            .with_update(FormulaUpdate::default())
    }

    pub fn with_health(mut self, health: FormulaHealth) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_update(mut self, update: FormulaUpdate) -> Self {
        self.update = Some(update);
        self
    }

    pub fn update_calls(&self) -> usize {
        *self.updates.borrow()
    }
}

impl FormulaRefresher for FakeFormulas {
    fn check(&self) -> Result<FormulaHealth> {
        match self.health {
            Some(health) => Ok(health),
            None => bail!("formula check unavailable"),
        }
    }

    fn update(&self) -> Result<FormulaUpdate> {
        *self.updates.borrow_mut() += 1;
        match self.update {
            Some(update) => Ok(update),
            None => bail!("formula update unavailable"),
        }
    }
}
