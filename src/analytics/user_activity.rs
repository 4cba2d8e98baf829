use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::analytics::collector::{tags, MetricsCollector};
use crate::analytics::window::{EventWindow, Timestamped, DAY_MS, HOUR_MS};
use crate::clock::SharedClock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityMetric {
    pub timestamp: u64,
    pub user_id: String,
    pub action: String,
    pub feature: String,
    pub duration: Option<u64>,
}

impl Timestamped for UserActivityMetric {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: String,
    pub activity_count: usize,
}

/// Per-user activity over a rolling window (default 24 hours).
pub struct UserActivityTracker {
    events: RwLock<EventWindow<UserActivityMetric>>,
    collector: Arc<MetricsCollector>,
    clock: SharedClock,
}

impl UserActivityTracker {
    pub fn new(window: Duration, collector: Arc<MetricsCollector>, clock: SharedClock) -> Self {
        Self {
            events: RwLock::new(EventWindow::new(window, DAY_MS)),
            collector,
            clock,
        }
    }

    pub fn record_activity(
        &self,
        user_id: &str,
        action: &str,
        feature: &str,
        duration_ms: Option<u64>,
    ) {
        let now = self.clock.now_millis();
        let event = UserActivityMetric {
            timestamp: now,
            user_id: user_id.to_string(),
            action: action.to_string(),
            feature: feature.to_string(),
            duration: duration_ms,
        };

        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event, now);

        self.collector.record(
            "user_activity",
            1.0,
            tags([("action", action), ("feature", feature)]),
        );
    }

    /// Distinct users seen within `within` (default one hour).
    pub fn active_users(&self, within: Option<Duration>) -> usize {
        let within_ms = within
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(HOUR_MS);
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        events
            .recent(self.clock.now_millis(), within_ms)
            .map(|e| e.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn activity_by_feature(&self) -> BTreeMap<String, usize> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut counts = BTreeMap::new();
        for event in events.in_window(self.clock.now_millis()) {
            *counts.entry(event.feature.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Top `limit` users by windowed activity. Ties keep first-seen order.
    pub fn most_active_users(&self, limit: usize) -> Vec<ActiveUser> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut ranked: Vec<ActiveUser> = Vec::new();
        for event in events.in_window(self.clock.now_millis()) {
            match index.get(event.user_id.as_str()) {
                Some(&slot) => ranked[slot].activity_count += 1,
                None => {
                    index.insert(event.user_id.as_str(), ranked.len());
                    ranked.push(ActiveUser {
                        user_id: event.user_id.clone(),
                        activity_count: 1,
                    });
                }
            }
        }
        // stable sort
        ranked.sort_by(|a, b| b.activity_count.cmp(&a.activity_count));
        ranked.truncate(limit);
        ranked
    }
}
