use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::analytics::{
    ApiErrorRateTracker, ConflictRateTracker, FeatureAdoptionTracker, MetricsCollector,
    SyncLatencyTracker, UserActivityTracker, DAY_MS, HOUR_MS,
};
use crate::clock::{system_clock, SharedClock};
use crate::config::MetricsConfig;
use crate::logging::entry::format_timestamp;
use crate::observability::summary::{
    ApiSummary, ConflictSummary, FeatureSummary, MetricsExport, MetricsSummary, RawMetrics,
    SyncSummary, UserSummary,
};

/// Features listed in a summary.
pub const SUMMARY_TOP_FEATURES: usize = 10;
/// Endpoints listed in a summary.
pub const SUMMARY_TOP_ENDPOINTS: usize = 5;

/// One collector plus the five trackers, queried as a unit.
pub struct ObservabilityFacade {
    collector: Arc<MetricsCollector>,
    conflicts: ConflictRateTracker,
    sync: SyncLatencyTracker,
    activity: UserActivityTracker,
    features: FeatureAdoptionTracker,
    api: ApiErrorRateTracker,
    clock: SharedClock,
}

impl ObservabilityFacade {
    pub fn new(config: &MetricsConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: &MetricsConfig, clock: SharedClock) -> Self {
        let collector = Arc::new(MetricsCollector::new(
            config.max_samples_per_metric,
            clock.clone(),
        ));

        Self {
            conflicts: ConflictRateTracker::new(
                Duration::from_secs(config.conflict_window_secs),
                collector.clone(),
                clock.clone(),
            ),
            sync: SyncLatencyTracker::new(
                Duration::from_secs(config.sync_window_secs),
                collector.clone(),
                clock.clone(),
            ),
            activity: UserActivityTracker::new(
                Duration::from_secs(config.activity_window_secs),
                collector.clone(),
                clock.clone(),
            ),
            features: FeatureAdoptionTracker::new(collector.clone(), clock.clone()),
            api: ApiErrorRateTracker::new(collector.clone()),
            collector,
            clock,
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn conflicts(&self) -> &ConflictRateTracker {
        &self.conflicts
    }

    pub fn sync_latency(&self) -> &SyncLatencyTracker {
        &self.sync
    }

    pub fn user_activity(&self) -> &UserActivityTracker {
        &self.activity
    }

    pub fn feature_adoption(&self) -> &FeatureAdoptionTracker {
        &self.features
    }

    pub fn api_errors(&self) -> &ApiErrorRateTracker {
        &self.api
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            conflicts: ConflictSummary {
                per_hour: self.conflicts.conflicts_per_hour(),
                by_type: self.conflicts.conflicts_by_type(),
                avg_resolution_time_ms: self.conflicts.average_resolution_time(),
            },
            sync: SyncSummary {
                p50: self.sync.percentile_latency(50.0),
                p95: self.sync.percentile_latency(95.0),
                p99: self.sync.percentile_latency(99.0),
                success_rate: self.sync.sync_success_rate(),
                avg_latency_by_client: self.sync.average_latency_by_client(),
            },
            users: UserSummary {
                active_last_hour: self
                    .activity
                    .active_users(Some(Duration::from_millis(HOUR_MS))),
                active_last_day: self
                    .activity
                    .active_users(Some(Duration::from_millis(DAY_MS))),
                by_feature: self.activity.activity_by_feature(),
            },
            features: FeatureSummary {
                most_used: self.features.most_used_features(SUMMARY_TOP_FEATURES),
            },
            api: ApiSummary {
                overall_error_rate: self.api.overall_error_rate(),
                top_error_endpoints: self.api.top_error_endpoints(SUMMARY_TOP_ENDPOINTS),
            },
        }
    }

    /// Summary plus per-metric collector aggregates, stamped with the current time.
    pub fn export_metrics(&self) -> MetricsExport {
        let now = i64::try_from(self.clock.now_millis()).unwrap_or(i64::MAX);
        let at = DateTime::<Utc>::from_timestamp_millis(now).unwrap_or_default();

        MetricsExport {
            timestamp: format_timestamp(at),
            summary: self.summary(),
            raw: RawMetrics {
                summary: self.collector.summary(),
                details: self.collector.aggregations(),
            },
        }
    }
}

impl Default for ObservabilityFacade {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}
