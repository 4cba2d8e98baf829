//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → admin server stops accepting
//!     → export / reload loops exit (aborted after drain_timeout_secs)
//!     → Observability::shutdown drains logs and spans
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, stop background loops, drain
//! - One deadline bounds the whole drain, not each task
//! - Config reload is driven by the file watcher, not SIGHUP

pub mod shutdown;
pub mod signals;

pub use shutdown::{DrainReport, Shutdown, DEFAULT_DRAIN_TIMEOUT};
pub use signals::wait_for_signal;
