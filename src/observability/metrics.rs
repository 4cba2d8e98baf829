//! Prometheus export of collector samples.
//!
//! # Responsibilities
//! - Install the global `metrics` recorder
//! - Describe the histograms the trackers emit
//!
//! # Design Decisions
//! - Installation is optional; without a recorder the `metrics` macros are no-ops
//! - Rendering happens on scrape (`GET /metrics`), not on a timer

use metrics::{describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and register metric descriptions.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_histogram!("conflict_detected", Unit::Count, "Sync conflicts detected");
    describe_histogram!(
        "conflict_resolution_time_ms",
        Unit::Milliseconds,
        "Time taken to resolve a sync conflict"
    );
    describe_histogram!("sync_latency_ms", Unit::Milliseconds, "Sync round-trip latency");
    describe_histogram!("sync_data_size_bytes", Unit::Bytes, "Payload size per sync");
    describe_histogram!("user_activity", Unit::Count, "User actions");
    describe_histogram!("feature_usage", Unit::Count, "Feature invocations");
    describe_histogram!("api_call", Unit::Count, "API calls by endpoint and outcome");
}
