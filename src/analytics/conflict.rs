//! Sync conflict rate tracking.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::analytics::collector::{tags, MetricsCollector};
use crate::analytics::window::{mean, EventWindow, Timestamped, HOUR_MS};
use crate::clock::SharedClock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictMetric {
    pub timestamp: u64,
    pub entity_type: String,
    pub conflict_type: String,
    pub resolved: bool,
    pub resolution_time: Option<u64>,
}

impl Timestamped for ConflictMetric {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

pub struct ConflictRateTracker {
    events: RwLock<EventWindow<ConflictMetric>>,
    collector: Arc<MetricsCollector>,
    clock: SharedClock,
}

impl ConflictRateTracker {
    /// Default window: one hour.
    pub fn new(window: Duration, collector: Arc<MetricsCollector>, clock: SharedClock) -> Self {
        Self {
            events: RwLock::new(EventWindow::new(window, HOUR_MS)),
            collector,
            clock,
        }
    }

    pub fn record_conflict(
        &self,
        entity_type: &str,
        conflict_type: &str,
        resolved: bool,
        resolution_time_ms: Option<u64>,
    ) {
        let now = self.clock.now_millis();
        let event = ConflictMetric {
            timestamp: now,
            entity_type: entity_type.to_string(),
            conflict_type: conflict_type.to_string(),
            resolved,
            resolution_time: resolution_time_ms,
        };

        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event, now);

        self.collector.record(
            "conflict_detected",
            1.0,
            tags([
                ("entity_type", entity_type),
                ("conflict_type", conflict_type),
                ("resolved", if resolved { "true" } else { "false" }),
            ]),
        );
        if let Some(ms) = resolution_time_ms {
            self.collector.record(
                "conflict_resolution_time_ms",
                ms as f64,
                tags([("entity_type", entity_type)]),
            );
        }
    }

    /// Conflicts in the window, scaled to a one-hour rate.
    pub fn conflicts_per_hour(&self) -> f64 {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let count = events.in_window(self.clock.now_millis()).count();
        count as f64 * HOUR_MS as f64 / events.window_ms() as f64
    }

    /// Conflict counts in the window, by entity type.
    pub fn conflicts_by_type(&self) -> BTreeMap<String, usize> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut counts = BTreeMap::new();
        for event in events.in_window(self.clock.now_millis()) {
            *counts.entry(event.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Mean resolution time (ms) over windowed conflicts that recorded one.
    pub fn average_resolution_time(&self) -> f64 {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let times: Vec<f64> = events
            .in_window(self.clock.now_millis())
            .filter_map(|e| e.resolution_time)
            .map(|ms| ms as f64)
            .collect();
        mean(&times)
    }

    /// Raw events currently retained.
    pub fn retained(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> (ConflictRateTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10 * HOUR_MS));
        let tracker = ConflictRateTracker::new(
            Duration::from_millis(HOUR_MS),
            Arc::new(MetricsCollector::default()),
            clock.clone(),
        );
        (tracker, clock)
    }

    #[test]
    fn test_counts_only_last_hour() {
        let (tracker, clock) = tracker();
        tracker.record_conflict("transaction", "concurrent_edit", true, Some(100));
        clock.advance(HOUR_MS - 1);
        tracker.record_conflict("account", "delete_edit", false, None);
        assert_eq!(tracker.conflicts_per_hour(), 2.0);

        clock.advance(2);
        assert_eq!(tracker.conflicts_per_hour(), 1.0);
    }

    #[test]
    fn test_old_events_are_purged_on_write() {
        let (tracker, clock) = tracker();
        tracker.record_conflict("transaction", "concurrent_edit", true, None);
        clock.advance(2 * HOUR_MS + 1);
        tracker.record_conflict("transaction", "concurrent_edit", true, None);
        assert_eq!(tracker.retained(), 1);
    }

    #[test]
    fn test_by_type_and_average_resolution() {
        let (tracker, _) = tracker();
        tracker.record_conflict("transaction", "concurrent_edit", true, Some(100));
        tracker.record_conflict("transaction", "concurrent_edit", true, Some(300));
        tracker.record_conflict("account", "rename", false, None);

        let by_type = tracker.conflicts_by_type();
        assert_eq!(by_type["transaction"], 2);
        assert_eq!(by_type["account"], 1);
        assert_eq!(tracker.average_resolution_time(), 200.0);
    }

    #[test]
    fn test_empty_defaults() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.conflicts_per_hour(), 0.0);
        assert!(tracker.conflicts_by_type().is_empty());
        assert_eq!(tracker.average_resolution_time(), 0.0);
    }

    #[test]
    fn test_rate_scales_with_window() {
        let clock = Arc::new(ManualClock::new(HOUR_MS));
        let tracker = ConflictRateTracker::new(
            Duration::from_millis(HOUR_MS / 2),
            Arc::new(MetricsCollector::default()),
            clock,
        );
        tracker.record_conflict("invoice", "stale", false, None);
        assert_eq!(tracker.conflicts_per_hour(), 2.0);
    }
}
