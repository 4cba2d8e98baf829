//! Process diagnostics subscriber.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the daemon's own events
//! - Honor `RUST_LOG`, falling back to the configured directive
//!
//! # Design Decisions
//! - Application log entries (StructuredLogger) and process diagnostics are
//!   separate streams unless the logger destination is `tracing`

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
