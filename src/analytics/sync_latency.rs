//! Sync latency tracking.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::analytics::collector::{tags, MetricsCollector};
use crate::analytics::window::{
    percentage, percentile_nearest_rank, EventWindow, Timestamped, HOUR_MS,
};
use crate::clock::SharedClock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLatencyMetric {
    pub timestamp: u64,
    pub client_id: String,
    pub operation: String,
    pub latency: f64,
    pub item_count: u64,
    pub data_size: u64,
    pub success: bool,
}

impl Timestamped for SyncLatencyMetric {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

pub struct SyncLatencyTracker {
    events: RwLock<EventWindow<SyncLatencyMetric>>,
    collector: Arc<MetricsCollector>,
    clock: SharedClock,
}

impl SyncLatencyTracker {
    /// Default window: one hour.
    pub fn new(window: Duration, collector: Arc<MetricsCollector>, clock: SharedClock) -> Self {
        Self {
            events: RwLock::new(EventWindow::new(window, HOUR_MS)),
            collector,
            clock,
        }
    }

    pub fn record_sync_latency(
        &self,
        client_id: &str,
        operation: &str,
        latency_ms: f64,
        item_count: u64,
        data_size: u64,
        success: bool,
    ) {
        let now = self.clock.now_millis();
        let event = SyncLatencyMetric {
            timestamp: now,
            client_id: client_id.to_string(),
            operation: operation.to_string(),
            latency: latency_ms,
            item_count,
            data_size,
            success,
        };

        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event, now);

        let outcome = if success { "success" } else { "failure" };
        self.collector.record(
            "sync_latency_ms",
            latency_ms,
            tags([("operation", operation), ("outcome", outcome)]),
        );
        self.collector.record(
            "sync_data_size_bytes",
            data_size as f64,
            tags([("operation", operation)]),
        );
    }

    /// Mean latency per client over the window.
    pub fn average_latency_by_client(&self) -> BTreeMap<String, f64> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for event in events.in_window(self.clock.now_millis()) {
            let slot = totals.entry(event.client_id.clone()).or_insert((0.0, 0));
            slot.0 += event.latency;
            slot.1 += 1;
        }
        totals
            .into_iter()
            .map(|(client, (sum, count))| (client, sum / count as f64))
            .collect()
    }

    /// Nearest-rank percentile of windowed latencies; 0 when empty.
    pub fn percentile_latency(&self, percentile: f64) -> f64 {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut latencies: Vec<f64> = events
            .in_window(self.clock.now_millis())
            .map(|e| e.latency)
            .collect();
        drop(events);
        latencies.sort_by(f64::total_cmp);
        percentile_nearest_rank(&latencies, percentile)
    }

    /// Successful syncs as a percentage; 100 when there are no samples.
    pub fn sync_success_rate(&self) -> f64 {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let (total, successes) = events
            .in_window(self.clock.now_millis())
            .fold((0u64, 0u64), |(total, ok), e| (total + 1, ok + u64::from(e.success)));
        percentage(successes, total, 100.0)
    }

    pub fn retained(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
