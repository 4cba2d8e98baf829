//! Configuration normalization.
//!
//! # Responsibilities
//! - Clamp numeric ranges (sample rate, buffer size, windows)
//! - Replace zero durations with their defaults
//! - Report every adjustment as a warning instead of rejecting the file
//!
//! # Design Decisions
//! - Only I/O and syntax errors fail a load; semantic problems are repaired
//! - Returns all warnings, not just the first

use std::fmt;

use crate::config::schema::{BufferConfig, ExportConfig, MetricsConfig, ObservabilityConfig, ShutdownConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub field: &'static str,
    pub message: String,
}

impl ValidationWarning {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Repair out-of-range values in place.
pub fn normalize(config: &mut ObservabilityConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let rate = config.tracing.sample_rate;
    if rate.is_nan() {
        config.tracing.sample_rate = 0.0;
        warnings.push(ValidationWarning::new("tracing.sample_rate", "NaN, using 0"));
    } else if !(0.0..=1.0).contains(&rate) {
        config.tracing.sample_rate = rate.clamp(0.0, 1.0);
        warnings.push(ValidationWarning::new(
            "tracing.sample_rate",
            format!("{rate} outside [0, 1], clamped to {}", config.tracing.sample_rate),
        ));
    }

    if config.buffer.max_size == 0 {
        config.buffer.max_size = 1;
        warnings.push(ValidationWarning::new("buffer.max_size", "0, using 1"));
    }
    if config.buffer.flush_interval_ms == 0 {
        config.buffer.flush_interval_ms = BufferConfig::default().flush_interval_ms;
        warnings.push(ValidationWarning::new(
            "buffer.flush_interval_ms",
            format!("0, using {}", config.buffer.flush_interval_ms),
        ));
    }

    let defaults = MetricsConfig::default();
    let windows = [
        ("metrics.conflict_window_secs", &mut config.metrics.conflict_window_secs, defaults.conflict_window_secs),
        ("metrics.sync_window_secs", &mut config.metrics.sync_window_secs, defaults.sync_window_secs),
        ("metrics.activity_window_secs", &mut config.metrics.activity_window_secs, defaults.activity_window_secs),
    ];
    for (field, value, default) in windows {
        if *value == 0 {
            *value = default;
            warnings.push(ValidationWarning::new(field, format!("0, using {default}")));
        }
    }
    if config.metrics.max_samples_per_metric == 0 {
        config.metrics.max_samples_per_metric = defaults.max_samples_per_metric;
        warnings.push(ValidationWarning::new(
            "metrics.max_samples_per_metric",
            format!("0, using {}", defaults.max_samples_per_metric),
        ));
    }

    if config.export.interval_secs == 0 {
        config.export.interval_secs = ExportConfig::default().interval_secs;
        warnings.push(ValidationWarning::new(
            "export.interval_secs",
            format!("0, using {}", config.export.interval_secs),
        ));
    }

    if config.shutdown.drain_timeout_secs == 0 {
        config.shutdown.drain_timeout_secs = ShutdownConfig::default().drain_timeout_secs;
        warnings.push(ValidationWarning::new(
            "shutdown.drain_timeout_secs",
            format!("0, using {}", config.shutdown.drain_timeout_secs),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        warnings.push(ValidationWarning::new(
            "admin.api_key",
            "empty; every admin request will be rejected",
        ));
    }

    warnings
}
