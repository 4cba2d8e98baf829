//! Ledger observability daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   business code ──► logger.<level>() ─► filter ─► console | buffer | tracing | custom
//!        │
//!        ├────────► tracer.trace() ───► sampler ─► span ─► exporter (in-memory | logging)
//!        │
//!        └────────► tracker.record*() ─► EventWindow / DashMap
//!                                   └──► MetricsCollector ─► Prometheus recorder
//!
//!   ObservabilityFacade ◄── admin router (/admin/*, /metrics) ◄── obs-cli
//!                      └──► periodic export (structured log entry)
//!
//!   config.toml ─► ConfigWatcher ─► apply_config (sample rate, log level, enabled)
//! ```
//!
//! Config path: first argument, else `LEDGER_OBS_CONFIG`, else built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use ledger_observability::admin::{self, AdminState};
use ledger_observability::config::{
    log_warnings, read_config, ConfigWatcher, ObservabilityConfig,
};
use ledger_observability::lifecycle::{wait_for_signal, Shutdown};
use ledger_observability::observability::logging::init_logging;
use ledger_observability::observability::metrics::install_prometheus;
use ledger_observability::Observability;

const CONFIG_ENV: &str = "LEDGER_OBS_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    let (config, warnings) = match &config_path {
        Some(path) => read_config(path)?,
        None => (ObservabilityConfig::default(), Vec::new()),
    };

    init_logging(&config.log_level)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "ledger-observability starting"
    );
    log_warnings(&warnings);

    let prometheus = if config.metrics.prometheus_enabled {
        match install_prometheus() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus recorder not installed");
                None
            }
        }
    } else {
        None
    };

    let obs = Arc::new(Observability::new(config.clone()));
    let shutdown = Shutdown::with_drain_timeout(Duration::from_secs(config.shutdown.drain_timeout_secs));

    if config.admin.enabled {
        let listener = admin::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(obs.clone(), prometheus);
        shutdown.spawn("admin", |rx| async move {
            if let Err(e) = admin::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    if config.export.enabled {
        let interval = Duration::from_secs(config.export.interval_secs);
        let obs = obs.clone();
        shutdown.spawn("export", move |rx| export_loop(obs, interval, rx));
    }

    // Dropping the watcher stops it, so it lives until main returns.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.run() {
                Ok(handle) => {
                    let obs = obs.clone();
                    shutdown.spawn("reload", move |rx| reload_loop(obs, updates, rx));
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    None
                }
            }
        }
        None => None,
    };

    wait_for_signal().await;
    tracing::info!(timeout = ?shutdown.drain_timeout(), "Shutting down");

    let report = shutdown.drain().await;
    if !report.is_clean() {
        tracing::warn!(
            panicked = ?report.panicked,
            aborted = ?report.aborted,
            "Background tasks did not stop cleanly"
        );
    }

    obs.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log the metrics export as a structured entry every `interval`.
async fn export_loop(obs: Arc<Observability>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let export = obs.facade().export_metrics();
                match serde_json::to_value(&export) {
                    Ok(value) => obs.logger().info("Metrics export", json!({ "export": value })),
                    Err(e) => tracing::error!(error = %e, "Failed to serialize metrics export"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn reload_loop(
    obs: Arc<Observability>,
    mut updates: mpsc::UnboundedReceiver<ObservabilityConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => obs.apply_config(&config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
