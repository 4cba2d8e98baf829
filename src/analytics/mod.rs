//! # Analytics
//!
//! Domain trackers for a local-first accounting client, plus the generic
//! collector they mirror into.
//!
//! # Data Flow
//! ```text
//!   record_*() ──► tracker (EventWindow / DashMap)
//!        │
//!        └──────► MetricsCollector ring ──► metrics::histogram! ──► Prometheus
//!
//!   query ──► tracker.read() ──► filter to window ──► derived stat
//! ```
//!
//! # Design Decisions
//! - Windowed trackers purge on write at twice the window; reads never mutate
//! - Feature adoption and API errors are lifetime counters without a window
//! - Every tracker takes an injected clock

pub mod api_errors;
pub mod collector;
pub mod conflict;
pub mod feature_adoption;
pub mod sync_latency;
pub mod user_activity;
pub mod window;

pub use api_errors::{ApiEndpointStats, ApiErrorRateTracker, EndpointErrorRate};
pub use collector::{
    tags, CollectorSummary, MetricAggregation, MetricSample, MetricsCollector, Tags,
    DEFAULT_MAX_SAMPLES,
};
pub use conflict::{ConflictMetric, ConflictRateTracker};
pub use feature_adoption::{FeatureAdoptionMetric, FeatureAdoptionTracker, FeatureUsage};
pub use sync_latency::{SyncLatencyMetric, SyncLatencyTracker};
pub use user_activity::{ActiveUser, UserActivityMetric, UserActivityTracker};
pub use window::{EventWindow, Timestamped, DAY_MS, HOUR_MS, MINUTE_MS};
