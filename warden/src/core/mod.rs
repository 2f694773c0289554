//! Deterministic, pure logic shared by warden's reconciliation commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures (including literal collaborator output) and return
//! deterministic outputs suitable for tests.

pub mod branch;
pub mod drift;
pub mod hooks;
pub mod report;
pub mod steps;
pub mod tracker_text;
