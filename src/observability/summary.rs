//! Snapshot shapes returned by the facade.
//!
//! Field names are camelCase on the wire so dashboards can consume the JSON
//! as-is.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analytics::{CollectorSummary, EndpointErrorRate, FeatureUsage, MetricAggregation};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub per_hour: f64,
    pub by_type: BTreeMap<String, usize>,
    pub avg_resolution_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub success_rate: f64,
    pub avg_latency_by_client: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub active_last_hour: usize,
    pub active_last_day: usize,
    pub by_feature: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSummary {
    pub most_used: Vec<FeatureUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSummary {
    pub overall_error_rate: f64,
    pub top_error_endpoints: Vec<EndpointErrorRate>,
}

/// Point-in-time view across every tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub conflicts: ConflictSummary,
    pub sync: SyncSummary,
    pub users: UserSummary,
    pub features: FeatureSummary,
    pub api: ApiSummary,
}

/// Collector-level aggregates keyed by metric name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMetrics {
    pub summary: CollectorSummary,
    pub details: BTreeMap<String, MetricAggregation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsExport {
    /// ISO-8601 UTC time of the export.
    pub timestamp: String,
    pub summary: MetricsSummary,
    pub raw: RawMetrics,
}
