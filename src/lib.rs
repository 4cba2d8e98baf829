//! Observability pipeline for a local-first accounting application:
//! correlated span tracing, redacted structured logging with batched
//! delivery, and windowed usage/health trackers behind one facade.

pub mod admin;
pub mod analytics;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod observability;
pub mod spans;

pub use config::ObservabilityConfig;
pub use correlation::{CorrelationContext, CorrelationId};
pub use lifecycle::Shutdown;
pub use logging::StructuredLogger;
pub use observability::{Observability, ObservabilityFacade};
pub use spans::{Span, SpanTracer};
