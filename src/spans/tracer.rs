//! Span lifecycle management.
//!
//! # State Machine
//! ```text
//! start_span ──▶ Active ──end_span──▶ Ended
//!                  │                    │
//!          attributes/events      further calls are no-ops
//! ```
//!
//! `trace` and `trace_async` wrap start/invoke/end so the span is always
//! ended: on success, on `Err`, on panic, and (async) when the future is
//! dropped before completion.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use uuid::Uuid;

use crate::clock::{system_clock, SharedClock};
use crate::config::TracingConfig;
use crate::correlation::CorrelationContext;
use crate::errors::ErrorInfo;
use crate::spans::exporter::SpanExporter;
use crate::spans::sampler::TraceSampler;
use crate::spans::span::{AttributeValue, Attributes, Span, SpanData, SpanEvent, SpanStatus};

/// Per-call options for `trace`, `trace_async` and `start_span_with`.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    pub attributes: Attributes,
    pub parent: Option<Span>,
    /// Correlation context of the operation; the tracer's own is used if unset.
    pub correlation: Option<Arc<CorrelationContext>>,
}

impl TraceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn parent(mut self, parent: &Span) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn correlation(mut self, correlation: Arc<CorrelationContext>) -> Self {
        self.correlation = Some(correlation);
        self
    }
}

/// Creates, annotates and ends spans, and hands finished ones to an exporter.
pub struct SpanTracer {
    service_name: String,
    service_version: String,
    environment: String,
    sampler: Arc<TraceSampler>,
    exporter: Arc<dyn SpanExporter>,
    correlation: Arc<CorrelationContext>,
    clock: SharedClock,
    enabled: AtomicBool,
    shut_down: AtomicBool,
}

impl SpanTracer {
    pub fn new(config: &TracingConfig, exporter: Arc<dyn SpanExporter>) -> Self {
        Self::with_clock(config, exporter, system_clock())
    }

    pub fn with_clock(config: &TracingConfig, exporter: Arc<dyn SpanExporter>, clock: SharedClock) -> Self {
        if let Some(endpoint) = &config.endpoint {
            tracing::warn!(
                endpoint = %endpoint,
                "Remote span export is not supported; spans stay in-process"
            );
        }

        Self {
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            environment: config.environment.clone(),
            sampler: Arc::new(TraceSampler::new(config.sample_rate, config.always_sample_errors)),
            exporter,
            correlation: Arc::new(CorrelationContext::new()),
            clock,
            enabled: AtomicBool::new(config.enabled),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Use `correlation` as the default context for spans without one.
    pub fn with_correlation(mut self, correlation: Arc<CorrelationContext>) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn sampler(&self) -> &TraceSampler {
        &self.sampler
    }

    pub fn exporter(&self) -> &Arc<dyn SpanExporter> {
        &self.exporter
    }

    pub fn correlation(&self) -> &Arc<CorrelationContext> {
        &self.correlation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed) && !self.shut_down.load(Ordering::Relaxed)
    }

    /// Global kill switch. Has no effect after `shutdown`.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Start a span. Returns `Span::Disabled` when tracing is off.
    pub fn start_span(&self, name: &str, attributes: Attributes, parent: Option<&Span>) -> Span {
        let options = TraceOptions {
            attributes,
            parent: parent.cloned(),
            correlation: None,
        };
        self.start_span_with(name, &options)
    }

    pub fn start_span_with(&self, name: &str, options: &TraceOptions) -> Span {
        if !self.is_enabled() {
            return Span::Disabled;
        }

        let (trace_id, parent_span_id) = match &options.parent {
            Some(Span::Active(parent)) => {
                parent.with_data(|p| (p.trace_id.clone(), Some(p.span_id.clone())))
            }
            _ => (Uuid::new_v4().simple().to_string(), None),
        };

        let correlation = options.correlation.as_ref().unwrap_or(&self.correlation);

        let mut attributes = Attributes::new();
        attributes.insert("service.name".into(), self.service_name.clone().into());
        attributes.insert("service.version".into(), self.service_version.clone().into());
        attributes.insert("deployment.environment".into(), self.environment.clone().into());
        attributes.extend(options.attributes.clone());

        Span::active(SpanData {
            trace_id,
            span_id: Uuid::new_v4().simple().to_string(),
            parent_span_id,
            name: name.to_string(),
            start_time_ms: self.clock.now_millis(),
            end_time_ms: None,
            status: SpanStatus::Unset,
            attributes,
            events: Vec::new(),
            error: None,
            correlation_id: Some(correlation.get()),
            sampled: self.sampler.should_sample(false),
        })
    }

    pub fn add_span_attributes(&self, span: &Span, attributes: Attributes) {
        if let Span::Active(handle) = span {
            handle.with_data(|d| {
                if d.end_time_ms.is_none() {
                    d.attributes.extend(attributes);
                }
            });
        }
    }

    pub fn add_span_event(&self, span: &Span, name: &str, attributes: Attributes) {
        if let Span::Active(handle) = span {
            let timestamp_ms = self.clock.now_millis();
            handle.with_data(|d| {
                if d.end_time_ms.is_none() {
                    d.events.push(SpanEvent {
                        name: name.to_string(),
                        timestamp_ms,
                        attributes,
                    });
                }
            });
        }
    }

    /// End a span with `ok` or `error` status. Ending twice is a no-op.
    pub fn end_span(&self, span: &Span, success: bool, error: Option<&ErrorInfo>) {
        let Span::Active(handle) = span else {
            return;
        };

        let end_time_ms = self.clock.now_millis();
        let finished = handle.with_data(|d| {
            if d.end_time_ms.is_some() {
                return None;
            }
            d.end_time_ms = Some(end_time_ms);
            d.status = if success { SpanStatus::Ok } else { SpanStatus::Error };
            if let Some(err) = error {
                let mut attributes = Attributes::new();
                attributes.insert("exception.type".into(), err.name.clone().into());
                attributes.insert("exception.message".into(), err.message.clone().into());
                if let Some(stack) = &err.stack {
                    attributes.insert("exception.stacktrace".into(), stack.clone().into());
                }
                d.events.push(SpanEvent {
                    name: "exception".into(),
                    timestamp_ms: end_time_ms,
                    attributes,
                });
                d.error = Some(err.clone());
            }
            Some(d.clone())
        });

        if let Some(data) = finished {
            self.export(&data);
        }
    }

    fn export(&self, data: &SpanData) {
        let failed = data.status == SpanStatus::Error;
        if !data.sampled && !(failed && self.sampler.should_sample(true)) {
            return;
        }

        let exporter = &self.exporter;
        match panic::catch_unwind(AssertUnwindSafe(|| exporter.export(data))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(span = %data.name, error = %e, "Span export failed");
            }
            Err(payload) => {
                let info = ErrorInfo::from_panic(payload.as_ref());
                tracing::error!(span = %data.name, error = %info.message, "Span exporter panicked");
            }
        }
    }

    /// Run `f` inside a span. `Err` and panics end the span with error
    /// status before reaching the caller unchanged. Any `Display` error
    /// type works, `Box<dyn Error>` included.
    pub fn trace<T, E, F>(&self, name: &str, options: TraceOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&Span) -> Result<T, E>,
        E: fmt::Display,
    {
        let span = self.start_span_with(name, &options);
        match panic::catch_unwind(AssertUnwindSafe(|| f(&span))) {
            Ok(Ok(value)) => {
                self.end_span(&span, true, None);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.end_span(&span, false, Some(&ErrorInfo::from_display(&err)));
                Err(err)
            }
            Err(payload) => {
                self.end_span(&span, false, Some(&ErrorInfo::from_panic(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of `trace`. The span is also ended (as an error)
    /// if the returned future is dropped before completing.
    pub async fn trace_async<T, E, F, Fut>(&self, name: &str, options: TraceOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let span = self.start_span_with(name, &options);
        let mut guard = CancelGuard {
            tracer: self,
            span: span.clone(),
            armed: true,
        };

        let outcome = AssertUnwindSafe(f(span.clone())).catch_unwind().await;
        guard.armed = false;

        match outcome {
            Ok(Ok(value)) => {
                self.end_span(&span, true, None);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.end_span(&span, false, Some(&ErrorInfo::from_display(&err)));
                Err(err)
            }
            Err(payload) => {
                self.end_span(&span, false, Some(&ErrorInfo::from_panic(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Stop creating spans and drain the exporter. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.enabled.store(false, Ordering::SeqCst);

        if let Err(e) = self.exporter.flush() {
            tracing::error!(error = %e, "Span exporter flush failed during shutdown");
        }
        if let Err(e) = self.exporter.shutdown() {
            tracing::error!(error = %e, "Span exporter shutdown failed");
        }
        tracing::info!(service = %self.service_name, "Tracer shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Ends a span as cancelled when an in-flight `trace_async` future is dropped.
struct CancelGuard<'a> {
    tracer: &'a SpanTracer,
    span: Span,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let info = ErrorInfo::new("Cancelled", "operation dropped before completion");
            self.tracer.end_span(&self.span, false, Some(&info));
        }
    }
}
