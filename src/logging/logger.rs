//! Structured, leveled logger.

use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use serde_json::Value;

use crate::config::{LogDestination, LoggerConfig};
use crate::correlation::CorrelationContext;
use crate::errors::ErrorInfo;
use crate::logging::console::{ConsoleWriter, StdConsole};
use crate::logging::entry::{ContextMap, IntoContext, LogEntry, ERROR_KEY};
use crate::logging::filter::LogFilter;
use crate::logging::level::LogLevel;

/// Callback receiving entries verbatim when the destination is `custom`.
pub type LogHandler = Arc<dyn Fn(&LogEntry) + Send + Sync>;

enum Output {
    Console(Arc<dyn ConsoleWriter>),
    Tracing,
    Custom(LogHandler),
}

/// State shared by a logger and all of its children.
struct Shared {
    min_level: AtomicU8,
    enabled: AtomicBool,
    pretty: bool,
    output: Output,
    filter: LogFilter,
}

/// Builder for `StructuredLogger`.
pub struct LoggerBuilder {
    config: LoggerConfig,
    handler: Option<LogHandler>,
    console: Option<Arc<dyn ConsoleWriter>>,
    correlation: Option<Arc<CorrelationContext>>,
    filter: Option<LogFilter>,
    context: ContextMap,
}

impl LoggerBuilder {
    /// Handler used when the destination is `custom`.
    pub fn handler(mut self, handler: LogHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Console writer used when the destination is `console`.
    pub fn console(mut self, writer: Arc<dyn ConsoleWriter>) -> Self {
        self.console = Some(writer);
        self
    }

    pub fn correlation(mut self, correlation: Arc<CorrelationContext>) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn filter(mut self, filter: LogFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Initial persistent context.
    pub fn context(mut self, context: impl IntoContext) -> Self {
        self.context = context.into_context();
        self
    }

    pub fn build(self) -> StructuredLogger {
        let console = || self.console.clone().unwrap_or_else(|| Arc::new(StdConsole));
        let output = match (self.config.destination, self.handler.clone()) {
            (LogDestination::Custom, Some(handler)) => Output::Custom(handler),
            (LogDestination::Custom, None) => {
                tracing::warn!("Custom log destination without a handler; falling back to console");
                Output::Console(console())
            }
            (LogDestination::Tracing, _) => Output::Tracing,
            (LogDestination::Console, _) => Output::Console(console()),
        };

        StructuredLogger {
            shared: Arc::new(Shared {
                min_level: AtomicU8::new(self.config.min_level.priority()),
                enabled: AtomicBool::new(self.config.enabled),
                pretty: self.config.pretty,
                output,
                filter: self.filter.unwrap_or_default(),
            }),
            context: Arc::new(ArcSwap::from_pointee(self.context)),
            correlation: self
                .correlation
                .unwrap_or_else(|| Arc::new(CorrelationContext::new())),
        }
    }
}

/// Produces leveled, structured, redacted log entries.
///
/// Cloning yields a handle to the same logger (same persistent context);
/// use `child` for an independent context.
#[derive(Clone)]
pub struct StructuredLogger {
    shared: Arc<Shared>,
    context: Arc<ArcSwap<ContextMap>>,
    correlation: Arc<CorrelationContext>,
}

impl StructuredLogger {
    pub fn new(config: &LoggerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &LoggerConfig) -> LoggerBuilder {
        LoggerBuilder {
            config: config.clone(),
            handler: None,
            console: None,
            correlation: None,
            filter: None,
            context: ContextMap::new(),
        }
    }

    /// Logger writing every entry to `handler`.
    pub fn with_handler(config: &LoggerConfig, handler: LogHandler) -> Self {
        let config = LoggerConfig {
            destination: LogDestination::Custom,
            ..config.clone()
        };
        Self::builder(&config).handler(handler).build()
    }

    pub fn debug(&self, message: &str, context: impl IntoContext) {
        self.log(LogLevel::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: impl IntoContext) {
        self.log(LogLevel::Info, message, context);
    }

    pub fn warn(&self, message: &str, context: impl IntoContext) {
        self.log(LogLevel::Warn, message, context);
    }

    pub fn error(&self, message: &str, context: impl IntoContext) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn fatal(&self, message: &str, context: impl IntoContext) {
        self.log(LogLevel::Fatal, message, context);
    }

    /// `error` with `err` folded into the context under `error`.
    pub fn error_with<E: Error + ?Sized>(&self, message: &str, err: &E, context: impl IntoContext) {
        self.log_error(LogLevel::Error, message, ErrorInfo::from_error(err), context);
    }

    /// `fatal` with `err` folded into the context under `error`.
    pub fn fatal_with<E: Error + ?Sized>(&self, message: &str, err: &E, context: impl IntoContext) {
        self.log_error(LogLevel::Fatal, message, ErrorInfo::from_error(err), context);
    }

    pub fn log_error(&self, level: LogLevel, message: &str, error: ErrorInfo, context: impl IntoContext) {
        if !self.is_level_enabled(level) {
            return;
        }
        let mut context = context.into_context();
        match serde_json::to_value(&error) {
            Ok(value) => {
                context.insert(ERROR_KEY.into(), value);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize error for log entry"),
        }
        self.emit(level, message, context);
    }

    pub fn log(&self, level: LogLevel, message: &str, context: impl IntoContext) {
        if !self.is_level_enabled(level) {
            return;
        }
        self.emit(level, message, context.into_context());
    }

    /// True if an entry at `level` would be produced.
    pub fn is_level_enabled(&self, level: LogLevel) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
            && level.priority() >= self.shared.min_level.load(Ordering::Relaxed)
    }

    fn emit(&self, level: LogLevel, message: &str, call_site: ContextMap) {
        let guard = self.context.load();
        let persistent: &ContextMap = &guard;
        let correlation_id = self.correlation.get();
        let entry = LogEntry::build(level, message, Some(&correlation_id), Utc::now(), &[persistent, &call_site]);
        let fields = self.shared.filter.filter_map(entry.fields());
        self.dispatch(&entry.with_fields(fields));
    }

    fn dispatch(&self, entry: &LogEntry) {
        match &self.shared.output {
            Output::Custom(handler) => {
                if panic::catch_unwind(AssertUnwindSafe(|| handler(entry))).is_err() {
                    tracing::error!(message = %entry.message(), "Custom log handler panicked");
                }
            }
            Output::Console(writer) => {
                let line = if self.shared.pretty { entry.to_pretty() } else { entry.to_json() };
                writer.write_line(entry.level().stream(), &line);
            }
            Output::Tracing => emit_tracing_event(entry),
        }
    }

    /// Merge `context` into the persistent context.
    pub fn set_context(&self, context: impl IntoContext) {
        let extra = context.into_context();
        self.context.rcu(|current| {
            let mut next = (**current).clone();
            next.extend(extra.clone());
            next
        });
    }

    pub fn clear_context(&self) {
        self.context.store(Arc::new(ContextMap::new()));
    }

    pub fn context(&self) -> ContextMap {
        (**self.context.load()).clone()
    }

    /// Logger sharing configuration and correlation, with its own persistent
    /// context seeded from this logger's context plus `context`.
    pub fn child(&self, context: impl IntoContext) -> StructuredLogger {
        let mut seeded = self.context();
        seeded.extend(context.into_context());
        StructuredLogger {
            shared: self.shared.clone(),
            context: Arc::new(ArcSwap::from_pointee(seeded)),
            correlation: self.correlation.clone(),
        }
    }

    /// Child bound to another operation's correlation context.
    pub fn scoped(&self, correlation: Arc<CorrelationContext>) -> StructuredLogger {
        StructuredLogger {
            shared: self.shared.clone(),
            context: Arc::new(ArcSwap::from_pointee(self.context())),
            correlation,
        }
    }

    pub fn correlation(&self) -> &Arc<CorrelationContext> {
        &self.correlation
    }

    pub fn filter(&self) -> &LogFilter {
        &self.shared.filter
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_priority(self.shared.min_level.load(Ordering::Relaxed))
    }

    /// Applies to this logger and every logger sharing its configuration.
    pub fn set_min_level(&self, level: LogLevel) {
        self.shared.min_level.store(level.priority(), Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
    }
}

fn emit_tracing_event(entry: &LogEntry) {
    let correlation_id = entry.correlation_id().unwrap_or_default();
    let fields = Value::Object(entry.fields().clone());
    match entry.level() {
        LogLevel::Debug => tracing::debug!(correlation_id, fields = %fields, "{}", entry.message()),
        LogLevel::Info => tracing::info!(correlation_id, fields = %fields, "{}", entry.message()),
        LogLevel::Warn => tracing::warn!(correlation_id, fields = %fields, "{}", entry.message()),
        LogLevel::Error => tracing::error!(correlation_id, fields = %fields, "{}", entry.message()),
        LogLevel::Fatal => tracing::error!(correlation_id, fatal = true, fields = %fields, "{}", entry.message()),
    }
}
