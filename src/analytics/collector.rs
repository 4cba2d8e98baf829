//! Generic time-series recorder.
//!
//! Trackers mirror their raw samples here for export. Each metric name keeps
//! a bounded ring of recent samples; every sample is also forwarded to the
//! `metrics` facade as a histogram so an installed recorder (Prometheus)
//! sees it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use serde::Serialize;

use crate::analytics::window::{mean, percentile_nearest_rank};
use crate::clock::{system_clock, SharedClock};

pub const DEFAULT_MAX_SAMPLES: usize = 1_000;

/// Sample labels.
pub type Tags = BTreeMap<String, String>;

pub fn tags<K, V, I>(pairs: I) -> Tags
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub value: f64,
    pub timestamp: u64,
    pub tags: Tags,
}

/// Aggregate over the retained samples of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAggregation {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub last: f64,
    pub last_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSummary {
    pub metric_count: usize,
    pub total_samples: usize,
}

#[derive(Debug)]
pub struct MetricsCollector {
    series: RwLock<BTreeMap<String, VecDeque<MetricSample>>>,
    max_samples: usize,
    clock: SharedClock,
}

impl MetricsCollector {
    pub fn new(max_samples: usize, clock: SharedClock) -> Self {
        Self {
            series: RwLock::new(BTreeMap::new()),
            max_samples: if max_samples == 0 { DEFAULT_MAX_SAMPLES } else { max_samples },
            clock,
        }
    }

    pub fn record(&self, name: &str, value: f64, tags: Tags) {
        let labels: Vec<metrics::Label> = tags
            .iter()
            .map(|(k, v)| metrics::Label::new(k.clone(), v.clone()))
            .collect();
        metrics::histogram!(name.to_string(), labels).record(value);

        let sample = MetricSample {
            value,
            timestamp: self.clock.now_millis(),
            tags,
        };
        let mut series = self.series.write().unwrap_or_else(|e| e.into_inner());
        let ring = series.entry(name.to_string()).or_default();
        if ring.len() == self.max_samples {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.series
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn samples(&self, name: &str) -> Vec<MetricSample> {
        self.series
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn aggregation(&self, name: &str) -> Option<MetricAggregation> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series.get(name).and_then(aggregate)
    }

    pub fn aggregations(&self) -> BTreeMap<String, MetricAggregation> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series
            .iter()
            .filter_map(|(name, ring)| aggregate(ring).map(|agg| (name.clone(), agg)))
            .collect()
    }

    pub fn summary(&self) -> CollectorSummary {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        CollectorSummary {
            metric_count: series.len(),
            total_samples: series.values().map(VecDeque::len).sum(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES, system_clock())
    }
}

fn aggregate(ring: &VecDeque<MetricSample>) -> Option<MetricAggregation> {
    let last = ring.back()?;
    let mut values: Vec<f64> = ring.iter().map(|s| s.value).collect();
    values.sort_by(f64::total_cmp);

    Some(MetricAggregation {
        count: values.len(),
        sum: values.iter().sum(),
        min: values[0],
        max: values[values.len() - 1],
        avg: mean(&values),
        p50: percentile_nearest_rank(&values, 50.0),
        p95: percentile_nearest_rank(&values, 95.0),
        p99: percentile_nearest_rank(&values, 99.0),
        last: last.value,
        last_timestamp: last.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[test]
    fn test_record_and_aggregate() {
        let clock = Arc::new(ManualClock::new(5_000));
        let collector = MetricsCollector::new(10, clock.clone());
        collector.record("sync_latency_ms", 30.0, tags([("operation", "push")]));
        clock.advance(10);
        collector.record("sync_latency_ms", 10.0, Tags::new());
        collector.record("sync_latency_ms", 20.0, Tags::new());

        let agg = collector.aggregation("sync_latency_ms").unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.sum, 60.0);
        assert_eq!(agg.min, 10.0);
        assert_eq!(agg.max, 30.0);
        assert_eq!(agg.avg, 20.0);
        assert_eq!(agg.p50, 20.0);
        assert_eq!(agg.last, 20.0);
        assert_eq!(agg.last_timestamp, 5_010);
        assert!(collector.aggregation("unknown").is_none());
    }

    #[test]
    fn test_ring_is_bounded() {
        let collector = MetricsCollector::new(3, system_clock());
        for i in 0..10 {
            collector.record("feature_usage", f64::from(i), Tags::new());
        }
        let samples = collector.samples("feature_usage");
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].value, 7.0);
    }

    #[test]
    fn test_summary_and_names() {
        let collector = MetricsCollector::default();
        collector.record("b", 1.0, Tags::new());
        collector.record("a", 1.0, Tags::new());
        collector.record("a", 2.0, Tags::new());

        assert_eq!(collector.metric_names(), vec!["a", "b"]);
        assert_eq!(
            collector.summary(),
            CollectorSummary {
                metric_count: 2,
                total_samples: 3
            }
        );
        assert_eq!(collector.aggregations().len(), 2);
    }
}
