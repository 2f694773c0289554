//! Stable exit codes for warden CLI commands.
//!
//! Check, sync and drift failures are reported in the command output and do
//! not change the exit code. An unusable `.warden/config.toml` is logged and
//! replaced by defaults.

/// Command ran to completion.
pub const OK: i32 = 0;
/// No `.warden/` directory in the working directory or any ancestor.
pub const WORKSPACE_NOT_FOUND: i32 = 1;
/// Output could not be written, or another unexpected I/O failure.
pub const INVALID: i32 = 2;
