//! Diagnostic tracing for warden commands.
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG`. Command output
//! (reports, listings, JSON) goes to stdout and is unaffected.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: `RUST_LOG` directives over a `warn`
/// default, compact lines on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=warden::drift=debug warden patrol step-drift
/// ```
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
