//! Workspace warden for an agent fleet.
//!
//! Keeps a fleet workspace consistent and its workers on track:
//!
//! - **[`core`]**: Pure logic (hook merging, step counting, drift verdicts,
//!   collaborator text parsing, check reports). No I/O.
//! - **[`io`]**: Side-effecting adapters (workspace layout, settings files,
//!   configuration, external collaborator CLIs). Collaborators sit behind
//!   traits so tests can swap in fakes.
//!
//! Orchestration modules ([`checks`], [`sync`], [`drift`], [`hooks_list`],
//! [`upgrade`], [`doctor`]) combine the two to implement CLI commands.

pub mod checks;
pub mod core;
pub mod doctor;
pub mod drift;
pub mod error;
pub mod exit_codes;
pub mod hooks_list;
pub mod io;
pub mod logging;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod upgrade;
