//! Time-windowed event log shared by the trackers.
//!
//! Events are appended in arrival order. Each write evicts from the front
//! every event older than twice the query window, so memory is bounded by
//! the event rate over `2 × window`. Reads filter to `window` without
//! mutating anything.

use std::collections::VecDeque;
use std::time::Duration;

pub const MINUTE_MS: u64 = 60_000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Event carrying a Unix-millisecond timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> u64;
}

#[derive(Debug, Clone)]
pub struct EventWindow<T> {
    events: VecDeque<T>,
    window_ms: u64,
}

impl<T: Timestamped> EventWindow<T> {
    /// A zero `window` falls back to `default_ms`.
    pub fn new(window: Duration, default_ms: u64) -> Self {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        Self {
            events: VecDeque::new(),
            window_ms: if window_ms == 0 { default_ms.max(1) } else { window_ms },
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Oldest timestamp still retained at `now`.
    pub fn retention_horizon(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_ms.saturating_mul(2))
    }

    pub fn push(&mut self, event: T, now: u64) {
        self.events.push_back(event);
        self.purge(now);
    }

    pub fn purge(&mut self, now: u64) {
        let horizon = self.retention_horizon(now);
        while self
            .events
            .front()
            .is_some_and(|e| e.timestamp() < horizon)
        {
            self.events.pop_front();
        }
    }

    /// Events no older than `within_ms` at `now`, in append order.
    pub fn recent(&self, now: u64, within_ms: u64) -> impl Iterator<Item = &T> {
        let cutoff = now.saturating_sub(within_ms);
        self.events.iter().filter(move |e| e.timestamp() >= cutoff)
    }

    /// Events inside the query window at `now`.
    pub fn in_window(&self, now: u64) -> impl Iterator<Item = &T> {
        self.recent(now, self.window_ms)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }
}

/// Nearest-rank percentile of an ascending slice: index `ceil(p/100 × n) − 1`
/// clamped into range. Returns 0 for an empty slice.
pub fn percentile_nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

/// Mean of `values`, 0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// `part / total × 100`, or `empty` when `total` is zero.
pub fn percentage(part: u64, total: u64, empty: f64) -> f64 {
    if total == 0 {
        empty
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tick(u64);

    impl Timestamped for Tick {
        fn timestamp(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_purge_keeps_two_windows() {
        let mut window = EventWindow::new(Duration::from_millis(100), HOUR_MS);
        window.push(Tick(1_000), 1_000);
        window.push(Tick(1_150), 1_150);
        assert_eq!(window.len(), 2);

        window.push(Tick(1_201), 1_201);
        assert_eq!(window.iter().cloned().collect::<Vec<_>>(), vec![Tick(1_150), Tick(1_201)]);
    }

    #[test]
    fn test_in_window_is_a_pure_read() {
        let mut window = EventWindow::new(Duration::from_millis(100), HOUR_MS);
        window.push(Tick(1_000), 1_000);
        window.push(Tick(1_090), 1_090);

        assert_eq!(window.in_window(1_150).count(), 1);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_zero_window_uses_default() {
        let window: EventWindow<Tick> = EventWindow::new(Duration::ZERO, HOUR_MS);
        assert_eq!(window.window_ms(), HOUR_MS);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        assert_eq!(percentile_nearest_rank(&values, 50.0), 50.0);
        assert_eq!(percentile_nearest_rank(&values, 95.0), 100.0);
        assert_eq!(percentile_nearest_rank(&values, 0.0), 10.0);
        assert_eq!(percentile_nearest_rank(&values, 250.0), 100.0);
        assert_eq!(percentile_nearest_rank(&[], 50.0), 0.0);
    }

    #[test]
    fn test_percentage_and_mean() {
        assert_eq!(percentage(0, 0, 100.0), 100.0);
        assert_eq!(percentage(1, 4, 0.0), 25.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 3.0]), 2.0);
    }
}
