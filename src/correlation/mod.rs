//! Correlation identifiers.
//!
//! # Data Flow
//! ```text
//! incoming request / new logical operation
//!     → headers.rs (read `x-correlation-id`, or generate)
//!     → CorrelationContext (owned by the operation, shared via Arc)
//!     → StructuredLogger::scoped / TraceOptions::correlation
//!     → every log entry and span of that operation carries the id
//! ```
//!
//! # Design Decisions
//! - No process-wide "current id": each operation owns its context value
//! - `get()` never returns an empty id; it generates lazily
//! - Ids are opaque strings of the form `cor-<unixMillis>-<base36>`

pub mod headers;

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

pub use headers::{add_to_headers, correlation_middleware, extract_from_headers, X_CORRELATION_ID};

const ID_PREFIX: &str = "cor";
const RANDOM_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier tying together the logs and spans of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh id: `cor-<unixMillis>-<9 random base36 chars>`.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: String = (0..RANDOM_LEN)
            .map(|_| BASE36[fastrand::usize(..BASE36.len())] as char)
            .collect();
        Self(format!("{}-{}-{}", ID_PREFIX, millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Holds the correlation id of one logical operation.
///
/// Shared by reference (usually `Arc<CorrelationContext>`) between the logger
/// and tracer handling that operation.
#[derive(Debug, Default)]
pub struct CorrelationContext {
    current: RwLock<Option<CorrelationId>>,
}

impl CorrelationContext {
    /// Create an empty context; the first `get()` assigns an id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context already bound to `id`.
    pub fn with_id(id: CorrelationId) -> Self {
        Self {
            current: RwLock::new(Some(id)),
        }
    }

    /// Produce a new id without touching the current one.
    pub fn generate(&self) -> CorrelationId {
        CorrelationId::generate()
    }

    pub fn set(&self, id: CorrelationId) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(id);
    }

    /// Current id, generating and storing one if none is set.
    pub fn get(&self) -> CorrelationId {
        if let Some(id) = self.peek() {
            return id;
        }
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        // Another writer may have raced us between the read and write locks.
        current.get_or_insert_with(CorrelationId::generate).clone()
    }

    /// Current id without generating one.
    pub fn peek(&self) -> Option<CorrelationId> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = CorrelationId::generate();
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "cor");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), RANDOM_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_get_is_lazy_and_stable() {
        let ctx = CorrelationContext::new();
        assert!(ctx.peek().is_none());

        let first = ctx.get();
        assert!(!first.as_str().is_empty());
        assert_eq!(ctx.get(), first);
    }

    #[test]
    fn test_generate_does_not_replace_current() {
        let ctx = CorrelationContext::with_id("cor-1-abc".into());
        let fresh = ctx.generate();
        assert_ne!(fresh, ctx.get());
        assert_eq!(ctx.get().as_str(), "cor-1-abc");
    }

    #[test]
    fn test_clear_forces_new_id() {
        let ctx = CorrelationContext::new();
        ctx.set("cor-1-fixed".into());
        assert_eq!(ctx.get().as_str(), "cor-1-fixed");

        ctx.clear();
        assert!(ctx.peek().is_none());
        assert_ne!(ctx.get().as_str(), "cor-1-fixed");
    }
}
