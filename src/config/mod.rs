//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (clamp, default, warn)
//!     → ObservabilityConfig
//!     → Observability::builder
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → unchanged or unreadable configs are dropped
//!     → mpsc channel to the daemon loop
//!     → Observability::apply_config (sample rate, log level, enabled)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Bad values are repaired with a warning; only unreadable files fail
//! - Only runtime-adjustable knobs are hot-reloaded; the rest need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{
    load_config, log_warnings, parse_config, parse_config_with_warnings, read_config, ConfigError,
};
pub use schema::{
    AdminConfig, BufferConfig, ExportConfig, LogDestination, LoggerConfig, MetricsConfig,
    ObservabilityConfig, ShutdownConfig, TracingConfig,
};
pub use validation::{normalize, ValidationWarning};
pub use watcher::{ConfigReloader, ConfigWatcher, ReloadOutcome};
