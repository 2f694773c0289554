//! Terminal session adapter: creation time, output tail, and messaging.

use std::process::Command;

use anyhow::{Result, bail};
use tracing::{instrument, warn};

use crate::io::process::{ProcessLimits, query_stdout, run_capture};

/// Session naming used by the fleet for a worker.
pub fn session_name(rig: &str, name: &str) -> String {
    format!("gt-{rig}-{name}")
}

pub trait SessionManager {
    /// Creation time of `session` as Unix seconds, `None` when unknown.
    fn created_at(&self, session: &str) -> Option<i64>;

    /// Recent raw output of the worker at `address` (`<rig>/<name>`).
    fn peek(&self, address: &str, lines: usize) -> Option<String>;

    /// Deliver `message` to the worker at `address`.
    fn nudge(&self, address: &str, message: &str) -> Result<()>;
}

/// Sessions read through the terminal multiplexer; peek and nudge go through the fleet CLI.
#[derive(Debug, Clone)]
pub struct CliSessions {
    session_program: String,
    fleet_program: String,
    limits: ProcessLimits,
}

impl CliSessions {
    pub fn new(
        session_program: impl Into<String>,
        fleet_program: impl Into<String>,
        limits: ProcessLimits,
    ) -> Self {
        Self {
            session_program: session_program.into(),
            fleet_program: fleet_program.into(),
            limits,
        }
    }
}

impl SessionManager for CliSessions {
    #[instrument(skip_all, fields(session = %session))]
    fn created_at(&self, session: &str) -> Option<i64> {
        let mut cmd = Command::new(&self.session_program);
        cmd.args(["display-message", "-t", session, "-p", "#{session_created}"]);
        parse_epoch_seconds(&query_stdout(cmd, &self.limits)?)
    }

    #[instrument(skip_all, fields(address = %address))]
    fn peek(&self, address: &str, lines: usize) -> Option<String> {
        let mut cmd = Command::new(&self.fleet_program);
        cmd.args(["peek", address, "-n", &lines.to_string()]);
        query_stdout(cmd, &self.limits)
    }

    #[instrument(skip_all, fields(address = %address))]
    fn nudge(&self, address: &str, message: &str) -> Result<()> {
        let mut cmd = Command::new(&self.fleet_program);
        cmd.args(["nudge", address, message]);
        let output = run_capture(cmd, &self.limits)?;
        if !output.success() {
            warn!(exit_code = ?output.status.code(), "nudge was not delivered");
            bail!("nudge {address} failed: {}", output.stderr_text().trim());
        }
        Ok(())
    }
}

/// Parse a `#{session_created}` rendering.
pub fn parse_epoch_seconds(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Minutes between `created` and `now` (both Unix seconds).
///
/// 0 when unknown, out of range, or in the future.
pub fn age_minutes(created: Option<i64>, now: i64) -> f64 {
    created
        .and_then(|created| now.checked_sub(created))
        .filter(|secs| *secs > 0)
        .map_or(0.0, |secs| secs as f64 / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_names_follow_fleet_convention() {
        assert_eq!(session_name("gastown", "furiosa"), "gt-gastown-furiosa");
    }

    #[test]
    fn parses_session_created() {
        assert_eq!(parse_epoch_seconds("1760000000\n"), Some(1_760_000_000));
        assert_eq!(parse_epoch_seconds("no server running"), None);
    }

    #[test]
    fn age_is_zero_when_unknown() {
        assert_eq!(age_minutes(None, 1_000), 0.0);
        assert_eq!(age_minutes(Some(280), 1_000), 12.0);
    }

    #[test]
    fn garbage_creation_times_age_zero() {
        assert_eq!(age_minutes(Some(i64::MIN), 1_760_000_000), 0.0);
        assert_eq!(age_minutes(Some(1_760_000_600), 1_760_000_000), 0.0);
    }

    #[test]
    fn missing_multiplexer_degrades() {
        let sessions = CliSessions::new(
            "warden-missing-session-binary",
            "warden-missing-fleet-binary",
            ProcessLimits::default(),
        );
        assert_eq!(sessions.created_at("gt-a-b"), None);
        assert_eq!(sessions.peek("a/b", 20), None);
        assert!(sessions.nudge("a/b", "hi").is_err());
    }
}
