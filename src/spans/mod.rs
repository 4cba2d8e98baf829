//! Span tracing subsystem.
//!
//! # Data Flow
//! ```text
//! business operation
//!     → tracer.rs (start_span / trace / trace_async)
//!     → sampler.rs (head decision at start; failures re-checked at end)
//!     → span.rs (Active handle records attributes, events, status)
//!     → exporter.rs (finished spans: logging, in-memory, or custom sink)
//! ```
//!
//! # Design Decisions
//! - A disabled span is `Span::Disabled`, never an `Option` checked at call sites
//! - Spans reference their parent by id only; the tracer owns nothing after export
//! - Exporter failures are logged and swallowed; the traced operation never
//!   fails because of tracing

pub mod exporter;
pub mod sampler;
pub mod span;
pub mod tracer;

pub use exporter::{ExportError, InMemoryExporter, LoggingExporter, NoopExporter, SpanExporter};
pub use sampler::TraceSampler;
pub use span::{attributes, AttributeValue, Attributes, Span, SpanData, SpanEvent, SpanState, SpanStatus};
pub use tracer::{SpanTracer, TraceOptions};
