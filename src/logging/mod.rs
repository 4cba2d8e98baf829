//! Structured logging subsystem.
//!
//! # Data Flow
//! ```text
//! logger.<level>(message, context)
//!     → logger.rs (level gate; dropped entries are never formatted)
//!     → entry.rs (fixed fields ← persistent context ← call-site context)
//!     → filter.rs (redact sensitive keys at any depth)
//!     → destination:
//!         console  → console.rs (JSON line or pretty block, per-level stream)
//!         tracing  → re-emitted as a `tracing` event
//!         custom   → handler (e.g. buffer.rs for batched delivery)
//! ```
//!
//! # Design Decisions
//! - Entries are immutable once built
//! - Child loggers share configuration and correlation, never context
//! - Level and enabled flag are atomics so they can change at runtime

pub mod buffer;
pub mod console;
pub mod entry;
pub mod filter;
pub mod level;
pub mod logger;

pub use buffer::{BufferStats, ConsoleSink, FlushHandler, LogBuffer, SinkError};
pub use console::{ConsoleWriter, StdConsole};
pub use entry::{merge_overlays, ContextMap, IntoContext, LogEntry};
pub use filter::{LogFilter, REDACTED};
pub use level::{ConsoleStream, LogLevel};
pub use logger::{LogHandler, LoggerBuilder, StructuredLogger};
