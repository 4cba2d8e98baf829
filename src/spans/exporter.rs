//! Span export boundary.
//!
//! The tracer hands every finished, sampled span to a `SpanExporter`.
//! Remote backends are out of scope; the in-process exporters below cover
//! logging, inspection and tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

use crate::spans::span::{SpanData, SpanStatus};

/// Errors reported by an exporter. The tracer logs and swallows them.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("exporter unavailable: {0}")]
    Unavailable(String),

    #[error("export failed: {0}")]
    Failed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for finished spans.
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: &SpanData) -> Result<(), ExportError>;

    /// Push out anything buffered.
    fn flush(&self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Release resources; called once by `SpanTracer::shutdown`.
    fn shutdown(&self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Recently exported spans, newest last, if this exporter keeps any.
    fn recent(&self) -> Vec<SpanData> {
        Vec::new()
    }
}

/// Discards every span.
#[derive(Debug, Default)]
pub struct NoopExporter;

impl SpanExporter for NoopExporter {
    fn export(&self, _span: &SpanData) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Emits each finished span as a `tracing` event.
#[derive(Debug, Clone)]
pub struct LoggingExporter {
    service_name: String,
}

impl LoggingExporter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl SpanExporter for LoggingExporter {
    fn export(&self, span: &SpanData) -> Result<(), ExportError> {
        let attributes = serde_json::to_string(&span.attributes)?;
        let correlation_id = span
            .correlation_id
            .as_ref()
            .map(|c| c.as_str())
            .unwrap_or_default();

        match span.status {
            SpanStatus::Error => tracing::warn!(
                service = %self.service_name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent_span_id = ?span.parent_span_id,
                correlation_id = %correlation_id,
                duration_ms = span.duration_ms().unwrap_or_default(),
                events = span.events.len(),
                attributes = %attributes,
                error = ?span.error.as_ref().map(|e| &e.message),
                "span {} failed",
                span.name
            ),
            _ => tracing::debug!(
                service = %self.service_name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent_span_id = ?span.parent_span_id,
                correlation_id = %correlation_id,
                duration_ms = span.duration_ms().unwrap_or_default(),
                events = span.events.len(),
                attributes = %attributes,
                "span {} finished",
                span.name
            ),
        }
        Ok(())
    }
}

/// Keeps the most recent finished spans in memory.
#[derive(Debug)]
pub struct InMemoryExporter {
    spans: Mutex<VecDeque<SpanData>>,
    capacity: usize,
}

impl InMemoryExporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            spans: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// All retained spans, oldest first.
    pub fn spans(&self) -> Vec<SpanData> {
        let spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.iter().cloned().collect()
    }

    pub fn find(&self, name: &str) -> Option<SpanData> {
        let spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.iter().rev().find(|s| s.name == name).cloned()
    }

    pub fn clear(&self) {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for InMemoryExporter {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, span: &SpanData) -> Result<(), ExportError> {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        if spans.len() == self.capacity {
            spans.pop_front();
        }
        spans.push_back(span.clone());
        Ok(())
    }

    fn recent(&self) -> Vec<SpanData> {
        self.spans()
    }
}
