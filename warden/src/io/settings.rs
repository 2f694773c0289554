//! Hooks layer documents and per-target settings files.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::hooks::Hooks;
use crate::error::{SyncError, SyncResult};
use crate::io::atomic::write_atomic;

const HOOKS_SCHEMA: &str = include_str!("../../../schemas/hooks/v1.schema.json");
const HOOKS_KEY: &str = "hooks";

static HOOKS_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(HOOKS_SCHEMA).unwrap();
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .unwrap()
});

/// Validate a base/override document against the embedded hooks schema.
pub fn validate_hooks_document(document: &Value) -> Result<(), Vec<String>> {
    let messages: Vec<String> = HOOKS_VALIDATOR
        .iter_errors(document)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages)
    }
}

/// Load a hooks layer. A missing file yields `None`; anything malformed is a
/// compute failure attributed to `source_name`.
pub fn load_hooks_layer(path: &Path, source_name: &str) -> SyncResult<Option<Hooks>> {
    let compute = |reason: String| SyncError::Compute {
        source_name: source_name.to_string(),
        reason,
    };
    if !path.exists() {
        debug!(path = %path.display(), "hooks layer absent");
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|err| compute(err.to_string()))?;
    let document: Value = serde_json::from_str(&contents).map_err(|err| compute(err.to_string()))?;
    validate_hooks_document(&document).map_err(|messages| compute(messages.join("; ")))?;
    Ok(Some(hooks_of(&document)))
}

fn hooks_of(document: &Value) -> Hooks {
    match document.get(HOOKS_KEY) {
        Some(Value::Object(events)) => Hooks::from_map(events.clone()),
        _ => Hooks::new(),
    }
}

/// An on-disk settings document; only its `hooks` key is managed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDoc {
    document: Map<String, Value>,
}

impl SettingsDoc {
    pub fn hooks(&self) -> Hooks {
        match self.document.get(HOOKS_KEY) {
            Some(Value::Object(events)) => Hooks::from_map(events.clone()),
            _ => Hooks::new(),
        }
    }

    /// Replace the hooks, keeping every other key and the key order.
    pub fn set_hooks(&mut self, hooks: &Hooks) {
        self.document.insert(HOOKS_KEY.to_string(), hooks.to_value());
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut buf = serde_json::to_string_pretty(&self.document)?;
        buf.push('\n');
        Ok(buf)
    }
}

/// Parse a settings file. Unreadable, malformed, or non-object `hooks` are load failures.
pub fn load_settings(path: &Path) -> SyncResult<SettingsDoc> {
    let load = |reason: String| SyncError::Load {
        path: path.to_path_buf(),
        reason,
    };
    let contents = fs::read_to_string(path).map_err(|err| load(err.to_string()))?;
    let value: Value = serde_json::from_str(&contents).map_err(|err| load(err.to_string()))?;
    let Value::Object(document) = value else {
        return Err(load("settings must be a JSON object".to_string()));
    };
    if let Some(hooks) = document.get(HOOKS_KEY)
        && !hooks.is_object()
    {
        return Err(load("hooks must be an object".to_string()));
    }
    Ok(SettingsDoc { document })
}

/// Write `settings` atomically as pretty JSON with a trailing newline.
pub fn write_settings(path: &Path, settings: &SettingsDoc) -> SyncResult<()> {
    let write = |reason: String| SyncError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let buf = settings
        .to_pretty_json()
        .map_err(|err| write(err.to_string()))?;
    write_atomic(path, &buf).map_err(|err| write(format!("{err:#}")))
}
