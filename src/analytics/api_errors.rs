use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::analytics::collector::{tags, MetricsCollector};
use crate::analytics::window::percentage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApiEndpointStats {
    pub total: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointErrorRate {
    pub endpoint: String,
    pub error_rate: f64,
    pub total_calls: u64,
}

/// Lifetime call and error counts per endpoint.
pub struct ApiErrorRateTracker {
    endpoints: DashMap<String, ApiEndpointStats>,
    collector: Arc<MetricsCollector>,
}

impl ApiErrorRateTracker {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self {
            endpoints: DashMap::new(),
            collector,
        }
    }

    pub fn record_api_call(&self, endpoint: &str, is_error: bool) {
        {
            let mut stats = self.endpoints.entry(endpoint.to_string()).or_default();
            stats.total += 1;
            if is_error {
                stats.errors += 1;
            }
        }

        let outcome = if is_error { "error" } else { "ok" };
        self.collector.record(
            "api_call",
            1.0,
            tags([("endpoint", endpoint), ("outcome", outcome)]),
        );
    }

    /// Percentage of failed calls to `endpoint`; 0 when never called.
    pub fn error_rate(&self, endpoint: &str) -> f64 {
        self.endpoints
            .get(endpoint)
            .map(|s| percentage(s.errors, s.total, 0.0))
            .unwrap_or(0.0)
    }

    pub fn overall_error_rate(&self) -> f64 {
        let (total, errors) = self
            .endpoints
            .iter()
            .fold((0, 0), |(t, e), s| (t + s.total, e + s.errors));
        percentage(errors, total, 0.0)
    }

    /// Endpoints with at least one error, highest rate first.
    pub fn top_error_endpoints(&self, limit: usize) -> Vec<EndpointErrorRate> {
        let mut rates: Vec<EndpointErrorRate> = self
            .endpoints
            .iter()
            .filter(|entry| entry.errors > 0)
            .map(|entry| EndpointErrorRate {
                endpoint: entry.key().clone(),
                error_rate: percentage(entry.errors, entry.total, 0.0),
                total_calls: entry.total,
            })
            .collect();
        rates.sort_by(|a, b| {
            b.error_rate
                .total_cmp(&a.error_rate)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        rates.truncate(limit);
        rates
    }

    pub fn stats(&self, endpoint: &str) -> Option<ApiEndpointStats> {
        self.endpoints.get(endpoint).map(|s| *s)
    }
}
