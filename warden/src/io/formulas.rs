//! Formula refresh collaborator used by the last upgrade step.

use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::io::process::{ProcessLimits, run_capture};

/// Health of installed formulas relative to the embedded copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormulaHealth {
    pub ok: usize,
    pub outdated: usize,
    pub missing: usize,
    pub new: usize,
    pub untracked: usize,
    pub modified: usize,
}

impl FormulaHealth {
    pub fn needs_update(&self) -> usize {
        self.outdated + self.missing + self.new + self.untracked
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormulaUpdate {
    pub updated: usize,
    pub skipped: usize,
    pub reinstalled: usize,
}

pub trait FormulaRefresher {
    fn check(&self) -> Result<FormulaHealth>;
    fn update(&self) -> Result<FormulaUpdate>;
}

/// Refresher backed by `<fleet> formula check|update --json`.
#[derive(Debug, Clone)]
pub struct CliFormulas {
    program: String,
    limits: ProcessLimits,
}

impl CliFormulas {
    pub fn new(program: impl Into<String>, limits: ProcessLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }

    fn run_json<T: DeserializeOwned>(&self, action: &str) -> Result<T> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["formula", action, "--json"]);
        let output = run_capture(cmd, &self.limits)
            .with_context(|| format!("run {} formula {action}", self.program))?;
        if !output.success() {
            bail!(
                "{} formula {action} failed: {}",
                self.program,
                output.stderr_text().trim()
            );
        }
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse formula {action} output"))
    }
}

impl FormulaRefresher for CliFormulas {
    #[instrument(skip_all)]
    fn check(&self) -> Result<FormulaHealth> {
        self.run_json("check")
    }

    #[instrument(skip_all)]
    fn update(&self) -> Result<FormulaUpdate> {
        self.run_json("update")
    }
}
