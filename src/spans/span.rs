//! Span data model.
//!
//! A span is either `Active` (a shared handle to its mutable record) or
//! `Disabled` (tracing off or the tracer shut down). Every tracer operation
//! matches on the variant, so a disabled span is always a safe no-op.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;
use crate::errors::ErrorInfo;

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

/// Span attribute map.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Build an attribute map from `(key, value)` pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Not ended yet.
    Unset,
    Ok,
    Error,
}

/// Lifecycle position of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Active,
    Ended,
}

/// Timestamped annotation on a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvent {
    pub name: String,
    pub timestamp_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attributes: Attributes,
}

/// Recorded state of one traced operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanData {
    pub trace_id: String,
    pub span_id: String,
    /// Parent span id; the parent itself is not retained.
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub status: SpanStatus,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Head sampling decision taken at start.
    pub sampled: bool,
}

impl SpanData {
    pub fn state(&self) -> SpanState {
        if self.end_time_ms.is_some() {
            SpanState::Ended
        } else {
            SpanState::Active
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time_ms
            .map(|end| end.saturating_sub(self.start_time_ms))
    }
}

/// Shared, lock-protected record of an active span.
#[derive(Debug)]
pub struct SpanHandle {
    data: Mutex<SpanData>,
}

impl SpanHandle {
    pub(crate) fn new(data: SpanData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    pub(crate) fn with_data<R>(&self, f: impl FnOnce(&mut SpanData) -> R) -> R {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut data)
    }

    pub fn snapshot(&self) -> SpanData {
        self.with_data(|d| d.clone())
    }
}

/// A traced operation, or the absence of one.
#[derive(Debug, Clone)]
pub enum Span {
    Active(Arc<SpanHandle>),
    Disabled,
}

impl Span {
    pub(crate) fn active(data: SpanData) -> Self {
        Span::Active(Arc::new(SpanHandle::new(data)))
    }

    /// True when the span exists and has not ended.
    pub fn is_recording(&self) -> bool {
        match self {
            Span::Active(handle) => handle.with_data(|d| d.state() == SpanState::Active),
            Span::Disabled => false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Span::Disabled)
    }

    pub fn span_id(&self) -> Option<String> {
        match self {
            Span::Active(handle) => Some(handle.with_data(|d| d.span_id.clone())),
            Span::Disabled => None,
        }
    }

    pub fn trace_id(&self) -> Option<String> {
        match self {
            Span::Active(handle) => Some(handle.with_data(|d| d.trace_id.clone())),
            Span::Disabled => None,
        }
    }

    pub fn snapshot(&self) -> Option<SpanData> {
        match self {
            Span::Active(handle) => Some(handle.snapshot()),
            Span::Disabled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> SpanData {
        SpanData {
            trace_id: "t".into(),
            span_id: "s".into(),
            parent_span_id: None,
            name: "reconcile".into(),
            start_time_ms: 100,
            end_time_ms: None,
            status: SpanStatus::Unset,
            attributes: Attributes::new(),
            events: Vec::new(),
            error: None,
            correlation_id: None,
            sampled: true,
        }
    }

    #[test]
    fn test_state_and_duration() {
        let mut data = sample_data();
        assert_eq!(data.state(), SpanState::Active);
        assert_eq!(data.duration_ms(), None);

        data.end_time_ms = Some(160);
        assert_eq!(data.state(), SpanState::Ended);
        assert_eq!(data.duration_ms(), Some(60));
    }

    #[test]
    fn test_disabled_span_accessors() {
        let span = Span::Disabled;
        assert!(!span.is_recording());
        assert!(span.span_id().is_none());
        assert!(span.snapshot().is_none());
    }

    #[test]
    fn test_attribute_builder() {
        let attrs = attributes([("account", AttributeValue::from("cash")), ("lines", 3i64.into())]);
        assert_eq!(attrs["account"], AttributeValue::String("cash".into()));
        assert_eq!(attrs["lines"], AttributeValue::Int(3));

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json, serde_json::json!({"account": "cash", "lines": 3}));
    }
}
