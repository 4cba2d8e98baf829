//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledger_observability::admin::{self, AdminState};
use ledger_observability::config::ObservabilityConfig;
use ledger_observability::lifecycle::Shutdown;
use ledger_observability::logging::{LogEntry, LogHandler};
use ledger_observability::spans::InMemoryExporter;
use ledger_observability::Observability;

pub const API_KEY: &str = "test-admin-key";

/// Collects every entry a logger emits.
#[derive(Clone, Default)]
pub struct LogCapture {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCapture {
    pub fn handler(&self) -> LogHandler {
        let entries = self.entries.clone();
        Arc::new(move |entry: &LogEntry| entries.lock().unwrap().push(entry.clone()))
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.message().to_string()).collect()
    }
}

pub fn test_config() -> ObservabilityConfig {
    let mut config = ObservabilityConfig::default();
    config.tracing.service_name = "ledger-test".into();
    config.tracing.environment = "test".into();
    config.admin.enabled = true;
    config.admin.api_key = API_KEY.into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.metrics.prometheus_enabled = false;
    config.export.enabled = false;
    config
}

/// Observability wired to a log capture and an in-memory span exporter.
pub fn observability(
    config: ObservabilityConfig,
) -> (Arc<Observability>, LogCapture, Arc<InMemoryExporter>) {
    let capture = LogCapture::default();
    let exporter = Arc::new(InMemoryExporter::default());
    let obs = Observability::builder(config)
        .log_handler(capture.handler())
        .exporter(exporter.clone())
        .build();
    (Arc::new(obs), capture, exporter)
}

/// Start the admin server on an ephemeral port.
pub async fn start_admin(obs: Arc<Observability>) -> (SocketAddr, Shutdown) {
    let listener = admin::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let state = AdminState::new(obs, None);

    tokio::spawn(async move {
        admin::serve(listener, state, rx).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
