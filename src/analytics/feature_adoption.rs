use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::analytics::collector::{tags, MetricsCollector};
use crate::analytics::window::percentage;
use crate::clock::SharedClock;

/// Lifetime usage of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAdoptionMetric {
    pub first_used: u64,
    pub last_used: u64,
    pub usage_count: u64,
    pub users: HashSet<String>,
}

/// Read-only view of a feature's adoption.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    pub feature: String,
    pub first_used: u64,
    pub last_used: u64,
    pub usage_count: u64,
    pub unique_users: usize,
}

impl FeatureUsage {
    fn from_metric(feature: &str, metric: &FeatureAdoptionMetric) -> Self {
        Self {
            feature: feature.to_string(),
            first_used: metric.first_used,
            last_used: metric.last_used,
            usage_count: metric.usage_count,
            unique_users: metric.users.len(),
        }
    }
}

/// Unwindowed per-feature counters.
pub struct FeatureAdoptionTracker {
    features: DashMap<String, FeatureAdoptionMetric>,
    collector: Arc<MetricsCollector>,
    clock: SharedClock,
}

impl FeatureAdoptionTracker {
    pub fn new(collector: Arc<MetricsCollector>, clock: SharedClock) -> Self {
        Self {
            features: DashMap::new(),
            collector,
            clock,
        }
    }

    pub fn record_feature_usage(&self, feature: &str, user_id: &str) {
        let now = self.clock.now_millis();
        {
            let mut entry = self
                .features
                .entry(feature.to_string())
                .or_insert_with(|| FeatureAdoptionMetric {
                    first_used: now,
                    last_used: now,
                    usage_count: 0,
                    users: HashSet::new(),
                });
            entry.usage_count += 1;
            entry.last_used = now;
            entry.users.insert(user_id.to_string());
        }

        self.collector
            .record("feature_usage", 1.0, tags([("feature", feature)]));
    }

    pub fn feature_usage(&self, feature: &str) -> Option<FeatureUsage> {
        self.features
            .get(feature)
            .map(|metric| FeatureUsage::from_metric(feature, &metric))
    }

    /// Unique users of `feature` as a percentage of `total_users`.
    /// Unknown features and a zero total both yield 0.
    pub fn adoption_rate(&self, feature: &str, total_users: u64) -> f64 {
        match self.features.get(feature) {
            Some(metric) => percentage(metric.users.len() as u64, total_users, 0.0),
            None => 0.0,
        }
    }

    /// Features ordered by usage count, descending; ties by name.
    pub fn most_used_features(&self, limit: usize) -> Vec<FeatureUsage> {
        let mut usages: Vec<FeatureUsage> = self
            .features
            .iter()
            .map(|entry| FeatureUsage::from_metric(entry.key(), entry.value()))
            .collect();
        usages.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        usages.truncate(limit);
        usages
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}
