//! Observability subsystem: the pieces that tie logger, tracer and trackers
//! together for one process.
//!
//! # Data Flow
//! ```text
//! ObservabilityConfig
//!     → context.rs (Observability::builder)
//!         → StructuredLogger (console | buffered console | tracing | custom)
//!         → SpanTracer (in-memory | logging | custom exporter)
//!         → facade.rs (collector + five trackers)
//!
//! Consumers:
//!     → facade.summary() / export_metrics() → summary.rs shapes → admin JSON
//!     → metrics.rs (Prometheus scrape of collector samples)
//!     → logging.rs (tracing subscriber for the process's own diagnostics)
//! ```
//!
//! # Design Decisions
//! - No global instances: `Observability` is built once and passed around
//! - Shutdown drains the log buffer before the tracer
//! - Summary queries never mutate tracker state

pub mod context;
pub mod facade;
pub mod logging;
pub mod metrics;
pub mod summary;

pub use context::{Observability, ObservabilityBuilder};
pub use facade::ObservabilityFacade;
pub use summary::{MetricsExport, MetricsSummary};
