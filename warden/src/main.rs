//! Workspace warden for an agent fleet.
//!
//! Locates the enclosing workspace (`.warden/`), then patrols workers for
//! step drift, lists hook-settings targets, runs post-install upgrades or
//! health checks.

use std::env;
use std::io::{self, Write};
use std::thread;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use warden::doctor::{DoctorOptions, run_doctor};
use warden::drift::{DriftMonitor, DriftOptions, render_agent};
use warden::error::WorkspaceNotFound;
use warden::exit_codes;
use warden::hooks_list::{list_targets, render_human, render_json};
use warden::io::branches::CliBranchStore;
use warden::io::config::{WardenConfig, load_config};
use warden::io::fleet::CliFleet;
use warden::io::formulas::CliFormulas;
use warden::io::process::ProcessLimits;
use warden::io::sessions::CliSessions;
use warden::io::tracker::CliTracker;
use warden::io::workspace::{WorkspacePaths, find_workspace_root};
use warden::logging;
use warden::sync::HooksSync;
use warden::upgrade::{Upgrade, UpgradeOptions};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Keep an agent-fleet workspace healthy and its workers on track"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Patrol routines over the active fleet.
    Patrol {
        #[command(subcommand)]
        command: PatrolCommand,
    },
    /// Inspect managed hook settings.
    Hooks {
        #[command(subcommand)]
        command: HooksCommand,
    },
    /// Post-install migration: reconcile the workspace with this release.
    Upgrade {
        /// Show what would change without modifying anything.
        #[arg(long)]
        dry_run: bool,
        /// List every target touched.
        #[arg(short, long)]
        verbose: bool,
        /// Never start daemons or agents.
        #[arg(long)]
        no_start: bool,
    },
    /// Run workspace health checks.
    Doctor {
        /// Repair what can be repaired automatically.
        #[arg(long)]
        fix: bool,
        /// Print check descriptions and details.
        #[arg(short, long)]
        verbose: bool,
        /// Never start daemons or agents.
        #[arg(long)]
        no_start: bool,
    },
}

#[derive(Subcommand)]
enum PatrolCommand {
    /// Flag workers that have been alive past the threshold with no step closed.
    StepDrift(StepDriftArgs),
}

#[derive(Args)]
struct StepDriftArgs {
    /// Refresh interval in seconds (only with --watch).
    #[arg(allow_negative_numbers = true)]
    interval: Option<String>,
    /// Emit a JSON array instead of the dashboard.
    #[arg(long)]
    agent: bool,
    /// Message each drifting worker.
    #[arg(long)]
    nudge: bool,
    /// Minutes alive with no closed step before a worker counts as drifting.
    #[arg(long)]
    threshold: Option<u32>,
    /// Redraw continuously.
    #[arg(short, long)]
    watch: bool,
}

#[derive(Subcommand)]
enum HooksCommand {
    /// List targets, their active overrides and sync status.
    List {
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        let code = if err.downcast_ref::<WorkspaceNotFound>().is_some() {
            exit_codes::WORKSPACE_NOT_FOUND
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().context("resolve current directory")?;
    let paths = WorkspacePaths::new(find_workspace_root(&cwd)?);
    let config = load_config(&paths.config_path).unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "ignoring unusable config, using defaults");
        WardenConfig::default()
    });
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Patrol {
            command: PatrolCommand::StepDrift(args),
        } => cmd_step_drift(&paths, &config, args, &mut stdout),
        Command::Hooks {
            command: HooksCommand::List { json },
        } => cmd_hooks_list(&paths, json, &mut stdout),
        Command::Upgrade {
            dry_run,
            verbose,
            no_start,
        } => {
            let options = UpgradeOptions {
                dry_run,
                verbose,
                no_start,
            };
            let formulas = CliFormulas::new(&config.collaborators.fleet, limits(&config));
            Upgrade::new(&paths, &config, &formulas, options).run(&mut stdout)?;
            Ok(())
        }
        Command::Doctor {
            fix,
            verbose,
            no_start,
        } => {
            let options = DoctorOptions {
                fix,
                verbose,
                no_start,
            };
            run_doctor(&paths, &config, options, &mut stdout)?;
            Ok(())
        }
    }
}

fn limits(config: &WardenConfig) -> ProcessLimits {
    ProcessLimits::from_config(&config.collaborators)
}

fn cmd_step_drift(
    paths: &WorkspacePaths,
    config: &WardenConfig,
    args: StepDriftArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let options = DriftOptions::resolve(
        &config.drift,
        args.threshold,
        args.nudge,
        args.interval.as_deref(),
    );
    let collaborators = &config.collaborators;
    let fleet = CliFleet::new(&collaborators.fleet, limits(config));
    let sessions = CliSessions::new(&collaborators.session, &collaborators.fleet, limits(config));
    let branches = CliBranchStore::new(&collaborators.branch_store, limits(config));
    let tracker = CliTracker::new(&collaborators.tracker, limits(config));
    let monitor = DriftMonitor::new(paths, &fleet, &sessions, &branches, &tracker);

    if args.watch {
        monitor.watch(&options, out, thread::sleep, |_| false)?;
        return Ok(());
    }
    let now = Utc::now().timestamp();
    if args.agent {
        let results = monitor.run_cycle(&options, now);
        writeln!(out, "{}", render_agent(&results).context("serialize drift report")?)?;
    } else {
        monitor.report(&options, now, out)?;
    }
    Ok(())
}

fn cmd_hooks_list(paths: &WorkspacePaths, json: bool, out: &mut dyn Write) -> Result<()> {
    let sync = HooksSync::new(paths);
    let listing = list_targets(&sync)?;
    if json {
        writeln!(out, "{}", render_json(&listing).context("serialize listing")?)?;
    } else {
        write!(out, "{}", render_human(&listing))?;
    }
    Ok(())
}
