use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, Query, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::admin::AdminState;
use crate::correlation::CorrelationContext;
use crate::logging::{BufferStats, LogLevel};
use crate::observability::{MetricsExport, MetricsSummary};
use crate::spans::SpanData;

const DEFAULT_SPAN_LIMIT: usize = 50;

/// Tracker key for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "<unmatched>";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub environment: String,
    pub uptime_secs: u64,
    pub tracing_enabled: bool,
    pub sample_rate: f64,
    pub logging_enabled: bool,
    pub min_log_level: LogLevel,
    pub buffered_entries: Option<usize>,
    pub buffer_stats: Option<BufferStats>,
}

#[derive(Debug, Deserialize)]
pub struct SpansQuery {
    pub limit: Option<usize>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let obs = &state.obs;
    let tracing_config = &obs.config().tracing;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if obs.tracer().is_shut_down() { "draining" } else { "operational" },
        service: tracing_config.service_name.clone(),
        environment: tracing_config.environment.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        tracing_enabled: obs.tracer().is_enabled(),
        sample_rate: obs.tracer().sampler().sample_rate(),
        logging_enabled: obs.logger().is_enabled(),
        min_log_level: obs.logger().min_level(),
        buffered_entries: obs.buffer().map(|b| b.len()),
        buffer_stats: obs.buffer().map(|b| b.stats()),
    })
}

pub async fn get_summary(State(state): State<AdminState>) -> Json<MetricsSummary> {
    Json(state.obs.facade().summary())
}

pub async fn get_export(
    State(state): State<AdminState>,
    Extension(correlation): Extension<Arc<CorrelationContext>>,
) -> Json<MetricsExport> {
    let export = state.obs.facade().export_metrics();
    state.obs.logger().scoped(correlation).info(
        "Metrics exported",
        json!({
            "metricCount": export.raw.summary.metric_count,
            "totalSamples": export.raw.summary.total_samples,
        }),
    );
    Json(export)
}

/// Most recent finished spans, newest last.
pub async fn get_spans(
    State(state): State<AdminState>,
    Query(query): Query<SpansQuery>,
) -> Json<Vec<SpanData>> {
    let mut spans = state.obs.tracer().exporter().recent();
    let limit = query.limit.unwrap_or(DEFAULT_SPAN_LIMIT);
    let skip = spans.len().saturating_sub(limit);
    spans.drain(..skip);
    Json(spans)
}

/// Prometheus text exposition, when the recorder is installed.
pub async fn get_metrics(State(state): State<AdminState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Prometheus recorder not installed").into_response(),
    }
}

/// Records every admin call in the API error-rate tracker, keyed by route
/// template. Unrouted paths share one key.
pub async fn track_api_calls(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or(UNMATCHED_ENDPOINT)
        .to_string();

    let response = next.run(request).await;
    let status = response.status();
    state
        .obs
        .facade()
        .api_errors()
        .record_api_call(&endpoint, status.is_client_error() || status.is_server_error());
    response
}
