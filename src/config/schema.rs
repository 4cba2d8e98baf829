//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so an empty file is a valid config.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root configuration for the observability daemon.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `tracing` filter directive for the process's own diagnostics
    /// (e.g. "info", "ledger_observability=debug"). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Structured logger settings.
    pub logger: LoggerConfig,

    /// Span tracer settings.
    pub tracing: TracingConfig,

    /// Batched log delivery.
    pub buffer: BufferConfig,

    /// Tracker windows and collector bounds.
    pub metrics: MetricsConfig,

    /// Admin dashboard.
    pub admin: AdminConfig,

    /// Periodic metrics export.
    pub export: ExportConfig,

    /// Graceful shutdown.
    pub shutdown: ShutdownConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logger: LoggerConfig::default(),
            tracing: TracingConfig::default(),
            buffer: BufferConfig::default(),
            metrics: MetricsConfig::default(),
            admin: AdminConfig::default(),
            export: ExportConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Where log entries go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    /// JSON lines (or pretty blocks) on stdout/stderr.
    #[default]
    Console,
    /// Re-emitted as `tracing` events.
    Tracing,
    /// Handed to a caller-supplied handler.
    Custom,
}

/// Structured logger configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Entries below this level are dropped.
    pub min_level: LogLevel,

    /// Multi-line indented JSON instead of one line per entry.
    pub pretty: bool,

    pub enabled: bool,

    pub destination: LogDestination,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            pretty: false,
            enabled: true,
            destination: LogDestination::Console,
        }
    }
}

/// Span tracer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,

    /// Remote collector URL. Accepted but not exported to.
    pub endpoint: Option<String>,

    /// Fraction of spans exported, in [0, 1].
    pub sample_rate: f64,

    /// Export failed spans regardless of `sample_rate`.
    pub always_sample_errors: bool,

    pub enabled: bool,

    /// Keep finished spans in memory for `/admin/spans`.
    pub in_memory_capacity: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            endpoint: None,
            sample_rate: 1.0,
            always_sample_errors: true,
            enabled: true,
            in_memory_capacity: 1_024,
        }
    }
}

/// Log buffer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Route console output through a batching buffer.
    pub enabled: bool,

    /// Entries per batch before a synchronous flush.
    pub max_size: usize,

    /// Timer flush period in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 100,
            flush_interval_ms: 5_000,
        }
    }
}

/// Tracker window configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub conflict_window_secs: u64,
    pub sync_window_secs: u64,
    pub activity_window_secs: u64,

    /// Ring size per collector metric.
    pub max_samples_per_metric: usize,

    /// Install the Prometheus recorder and serve `/metrics`.
    pub prometheus_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            conflict_window_secs: 3_600,
            sync_window_secs: 3_600,
            activity_window_secs: 86_400,
            max_samples_per_metric: 1_000,
            prometheus_enabled: true,
        }
    }
}

/// Admin dashboard configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin dashboard.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin dashboard bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Periodic export of the metrics summary into the log stream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// How long background tasks get to finish once shutdown starts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Tasks still running after this are aborted.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_secs: 10 }
    }
}
