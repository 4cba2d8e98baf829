//! Explicit process-level wiring of logger, tracer and facade.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{system_clock, SharedClock};
use crate::config::{LogDestination, ObservabilityConfig};
use crate::correlation::CorrelationContext;
use crate::logging::{
    ConsoleSink, ConsoleWriter, LogBuffer, LogEntry, LogFilter, LogHandler, StdConsole,
    StructuredLogger,
};
use crate::observability::facade::ObservabilityFacade;
use crate::spans::{InMemoryExporter, LoggingExporter, SpanExporter, SpanTracer};

/// Builder for `Observability`.
pub struct ObservabilityBuilder {
    config: ObservabilityConfig,
    log_handler: Option<LogHandler>,
    console: Option<Arc<dyn ConsoleWriter>>,
    exporter: Option<Arc<dyn SpanExporter>>,
    filter: Option<LogFilter>,
    clock: Option<SharedClock>,
}

impl ObservabilityBuilder {
    /// Deliver every log entry to `handler` instead of the console.
    pub fn log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    pub fn console(mut self, writer: Arc<dyn ConsoleWriter>) -> Self {
        self.console = Some(writer);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn SpanExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn filter(mut self, filter: LogFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Observability {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(system_clock);
        let correlation = Arc::new(CorrelationContext::new());
        let console = self.console.unwrap_or_else(|| Arc::new(StdConsole));

        let mut logger_config = config.logger.clone();
        let mut buffer = None;
        let handler = match self.log_handler {
            Some(handler) => Some(handler),
            None if config.buffer.enabled && config.logger.destination == LogDestination::Console => {
                let sink = Arc::new(ConsoleSink::new(console.clone(), config.logger.pretty));
                let log_buffer = Arc::new(LogBuffer::new(
                    config.buffer.max_size,
                    Duration::from_millis(config.buffer.flush_interval_ms),
                    sink,
                ));
                buffer = Some(log_buffer.clone());
                let handler: LogHandler =
                    Arc::new(move |entry: &LogEntry| log_buffer.add(entry.clone()));
                Some(handler)
            }
            None => None,
        };

        if handler.is_some() {
            logger_config.destination = LogDestination::Custom;
        }
        let mut builder = StructuredLogger::builder(&logger_config)
            .console(console)
            .correlation(correlation.clone())
            .filter(self.filter.unwrap_or_default());
        if let Some(handler) = handler {
            builder = builder.handler(handler);
        }
        let logger = builder.build();

        let memory = (self.exporter.is_none() && config.tracing.in_memory_capacity > 0)
            .then(|| Arc::new(InMemoryExporter::new(config.tracing.in_memory_capacity)));
        let exporter: Arc<dyn SpanExporter> = match (self.exporter, &memory) {
            (Some(exporter), _) => exporter,
            (None, Some(memory)) => memory.clone(),
            (None, None) => Arc::new(LoggingExporter::new(config.tracing.service_name.clone())),
        };
        let tracer = Arc::new(
            SpanTracer::with_clock(&config.tracing, exporter, clock.clone())
                .with_correlation(correlation.clone()),
        );

        let facade = Arc::new(ObservabilityFacade::with_clock(&config.metrics, clock.clone()));

        tracing::info!(
            service = %config.tracing.service_name,
            environment = %config.tracing.environment,
            log_destination = ?logger_config.destination,
            buffered = buffer.is_some(),
            sample_rate = config.tracing.sample_rate,
            "Observability initialized"
        );

        Observability {
            config,
            logger,
            tracer,
            facade,
            buffer,
            correlation,
            clock,
        }
    }
}

/// Logger, tracer and metrics facade for one process.
///
/// Replaces process-wide singletons: create one at startup and pass clones of
/// its parts to the code that produces events.
pub struct Observability {
    config: ObservabilityConfig,
    logger: StructuredLogger,
    tracer: Arc<SpanTracer>,
    facade: Arc<ObservabilityFacade>,
    buffer: Option<Arc<LogBuffer>>,
    correlation: Arc<CorrelationContext>,
    clock: SharedClock,
}

impl Observability {
    pub fn builder(config: ObservabilityConfig) -> ObservabilityBuilder {
        ObservabilityBuilder {
            config,
            log_handler: None,
            console: None,
            exporter: None,
            filter: None,
            clock: None,
        }
    }

    pub fn new(config: ObservabilityConfig) -> Self {
        Self::builder(config).build()
    }

    /// Configuration this instance was built from. Hot reloads are not reflected.
    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn tracer(&self) -> &Arc<SpanTracer> {
        &self.tracer
    }

    pub fn facade(&self) -> &Arc<ObservabilityFacade> {
        &self.facade
    }

    pub fn buffer(&self) -> Option<&Arc<LogBuffer>> {
        self.buffer.as_ref()
    }

    /// Process-level correlation context, used when no per-operation one is given.
    pub fn correlation(&self) -> &Arc<CorrelationContext> {
        &self.correlation
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Apply the runtime-adjustable subset of `config`.
    pub fn apply_config(&self, config: &ObservabilityConfig) {
        self.tracer.sampler().set_sample_rate(config.tracing.sample_rate);
        self.tracer.set_enabled(config.tracing.enabled);
        self.logger.set_min_level(config.logger.min_level);
        self.logger.set_enabled(config.logger.enabled);

        tracing::info!(
            sample_rate = self.tracer.sampler().sample_rate(),
            tracing_enabled = config.tracing.enabled,
            min_level = %config.logger.min_level,
            logging_enabled = config.logger.enabled,
            "Observability config applied"
        );
    }

    /// Flush buffered logs and shut the tracer down. Idempotent.
    pub fn shutdown(&self) {
        if let Some(buffer) = &self.buffer {
            buffer.destroy();
        }
        self.tracer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use std::sync::Mutex;

    fn collecting() -> (LogHandler, Arc<Mutex<Vec<LogEntry>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: LogHandler = Arc::new(move |entry: &LogEntry| {
            sink.lock().unwrap().push(entry.clone());
        });
        (handler, seen)
    }

    #[test]
    fn test_handler_receives_entries() {
        let (handler, seen) = collecting();
        let obs = Observability::builder(ObservabilityConfig::default())
            .log_handler(handler)
            .build();

        obs.logger().info("ledger opened", ());
        obs.logger().debug("dropped", ());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message(), "ledger opened");
    }

    #[test]
    fn test_default_exporter_keeps_spans() {
        let obs = Observability::new(ObservabilityConfig::default());
        let span = obs.tracer().start_span("reconcile", Default::default(), None);
        obs.tracer().end_span(&span, true, None);

        let recent = obs.tracer().exporter().recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].name, "reconcile");
    }

    #[test]
    fn test_apply_config_adjusts_runtime_knobs() {
        let (handler, seen) = collecting();
        let obs = Observability::builder(ObservabilityConfig::default())
            .log_handler(handler)
            .build();

        let mut next = ObservabilityConfig::default();
        next.tracing.sample_rate = 0.0;
        next.logger.min_level = LogLevel::Error;
        obs.apply_config(&next);

        assert_eq!(obs.tracer().sampler().sample_rate(), 0.0);
        obs.logger().warn("suppressed", ());
        obs.logger().error("kept", ());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_buffered_console_flushes_on_shutdown() {
        #[derive(Default)]
        struct Lines(Mutex<Vec<String>>);
        impl ConsoleWriter for Lines {
            fn write_line(&self, _stream: crate::logging::ConsoleStream, line: &str) {
                self.0.lock().unwrap().push(line.to_string());
            }
        }

        let mut config = ObservabilityConfig::default();
        config.buffer.enabled = true;
        config.buffer.max_size = 10;
        let lines = Arc::new(Lines::default());
        let obs = Observability::builder(config).console(lines.clone()).build();

        obs.logger().info("first", ());
        obs.logger().info("second", ());
        assert!(lines.0.lock().unwrap().is_empty());
        assert_eq!(obs.buffer().map(|b| b.len()), Some(2));

        obs.shutdown();
        obs.shutdown();
        assert_eq!(lines.0.lock().unwrap().len(), 2);
        assert!(obs.tracer().is_shut_down());
    }
}
