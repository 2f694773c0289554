//! Collaborator subprocess capture with an optional timeout and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::config::CollaboratorConfig;

/// Limits applied to every collaborator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    /// `None` blocks until the child exits.
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl ProcessLimits {
    pub fn from_config(config: &CollaboratorConfig) -> Self {
        Self {
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl Default for ProcessLimits {
    fn default() -> Self {
        Self::from_config(&CollaboratorConfig::default())
    }
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success() && !self.timed_out
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is drained concurrently while the child runs; bytes beyond
/// `output_limit_bytes` are discarded.
#[instrument(
    skip_all,
    fields(program = ?cmd.get_program(), timeout_secs = limits.timeout.map(|t| t.as_secs()))
)]
pub fn run_capture(mut cmd: Command, limits: &ProcessLimits) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let mut timed_out = false;
    let status = match limits.timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, _) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 {
        warn!(stdout_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        timed_out,
    })
}

/// Run a collaborator query, degrading every failure to `None`.
///
/// Spawn errors, non-zero exits and timeouts are logged and treated as
/// absence of data for this cycle.
pub fn query_stdout(cmd: Command, limits: &ProcessLimits) -> Option<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    match run_capture(cmd, limits) {
        Ok(output) if output.success() => Some(output.stdout_text()),
        Ok(output) => {
            debug!(
                program = %program,
                exit_code = ?output.status.code(),
                timed_out = output.timed_out,
                stderr = %output.stderr_text().trim(),
                "collaborator query failed"
            );
            None
        }
        Err(err) => {
            warn!(program = %program, err = %format!("{err:#}"), "collaborator unavailable");
            None
        }
    }
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_without_timeout() {
        let limits = ProcessLimits {
            timeout: None,
            output_limit_bytes: 1024,
        };
        let output = run_capture(sh("printf hello"), &limits).expect("run");
        assert!(output.success());
        assert_eq!(output.stdout_text(), "hello");
    }

    #[test]
    fn bounds_captured_output() {
        let limits = ProcessLimits {
            timeout: None,
            output_limit_bytes: 4,
        };
        let output = run_capture(sh("printf abcdefgh"), &limits).expect("run");
        assert_eq!(output.stdout, b"abcd");
        assert_eq!(output.stdout_truncated, 4);
    }

    #[test]
    fn timeout_kills_and_degrades() {
        let limits = ProcessLimits {
            timeout: Some(Duration::from_millis(100)),
            output_limit_bytes: 1024,
        };
        let output = run_capture(sh("sleep 5"), &limits).expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
        assert_eq!(query_stdout(sh("sleep 5"), &limits), None);
    }

    #[test]
    fn missing_program_degrades_to_none() {
        let cmd = Command::new("warden-definitely-missing-binary");
        assert_eq!(query_stdout(cmd, &ProcessLimits::default()), None);
    }

    #[test]
    fn non_zero_exit_degrades_to_none() {
        assert_eq!(query_stdout(sh("echo out; exit 3"), &ProcessLimits::default()), None);
    }
}
