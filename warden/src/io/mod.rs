//! Side-effecting adapters: workspace files, configuration and external collaborators.

pub mod atomic;
pub mod branches;
pub mod config;
pub mod daemon_config;
pub mod fleet;
pub mod formulas;
pub mod identity;
pub mod process;
pub mod sessions;
pub mod settings;
pub mod tracker;
pub mod workspace;
