//! Override-chain model for managed hook settings.
//!
//! A target's expected hooks are the base hooks with every applicable
//! override layered on top, lowest precedence first.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name -> matcher entries, as stored under a settings file's `hooks` key.
///
/// Equality is structural: object key order is ignored at every depth,
/// array order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hooks(Map<String, Value>);

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(events: Map<String, Value>) -> Self {
        Self(events)
    }

    pub fn events(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Layer `other` on top of `self`: each event in `other` replaces ours,
    /// an empty array removes the event.
    pub fn apply(&mut self, other: &Hooks) {
        for (event, entries) in &other.0 {
            if entries.as_array().is_some_and(Vec::is_empty) {
                self.0.remove(event);
            } else {
                self.0.insert(event.clone(), entries.clone());
            }
        }
    }
}

/// Merge `layers` over `base` in order (last write wins per event).
pub fn merge_layers<'a, I>(base: &Hooks, layers: I) -> Hooks
where
    I: IntoIterator<Item = &'a Hooks>,
{
    let mut merged = base.clone();
    for layer in layers {
        merged.apply(layer);
    }
    merged
}

/// Override names that apply to a target key, lowest precedence first.
///
/// `<rig>/<role>` keys get the role-wide override and then the rig-specific
/// one; town-level keys only have their own.
pub fn applicable_overrides(key: &str) -> Vec<String> {
    match key.split_once('/') {
        Some((_, role)) => vec![role.to_string(), key.to_string()],
        None => vec![key.to_string()],
    }
}

/// File name that stores override `name` inside the overrides directory.
pub fn override_file_name(name: &str) -> String {
    format!("{}.json", name.replace('/', "__"))
}

/// Inverse of [`override_file_name`] for a file stem.
pub fn override_name_from_stem(stem: &str) -> String {
    stem.replace("__", "/")
}

/// A managed settings destination.
///
/// `key()` is the group identity shared by every member of a crew or polecat
/// pool (used for override lookup and listing); `identity()` names the
/// individual destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub rig: Option<String>,
    pub role: String,
    pub member: Option<String>,
}

impl Target {
    pub fn key(&self) -> String {
        match &self.rig {
            Some(rig) => format!("{rig}/{}", self.role),
            None => self.role.clone(),
        }
    }

    pub fn display_key(&self) -> String {
        self.key()
    }

    pub fn identity(&self) -> String {
        match &self.member {
            Some(member) => format!("{}/{member}", self.key()),
            None => self.key(),
        }
    }
}

/// Sync status of a target as shown by `hooks list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "in sync")]
    InSync,
    #[serde(rename = "out of sync")]
    OutOfSync,
    #[serde(rename = "error")]
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Missing => "missing",
            SyncStatus::InSync => "in sync",
            SyncStatus::OutOfSync => "out of sync",
            SyncStatus::Error => "error",
        }
    }

    /// Classify loaded hooks (`None` when the file is absent) against expected.
    pub fn classify(current: Option<&Hooks>, expected: &Hooks) -> Self {
        match current {
            None => SyncStatus::Missing,
            Some(current) if current == expected => SyncStatus::InSync,
            Some(_) => SyncStatus::OutOfSync,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What syncing a single target did (or would do under dry-run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}
