//! Admin dashboard: read-only JSON views over the observability state.
//!
//! # Routes
//! - `GET /admin/status`  process and pipeline status
//! - `GET /admin/summary` facade summary
//! - `GET /admin/export`  summary plus raw collector aggregates
//! - `GET /admin/spans`   recently finished spans (`?limit=N`)
//! - `GET /metrics`       Prometheus exposition
//!
//! Every route requires the bearer token and is recorded in the API
//! error-rate tracker, rejected requests included.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::correlation::correlation_middleware;
use crate::observability::Observability;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("failed to bind admin listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("admin server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub obs: Arc<Observability>,
    pub prometheus: Option<PrometheusHandle>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(obs: Arc<Observability>, prometheus: Option<PrometheusHandle>) -> Self {
        let api_key = Arc::from(obs.config().admin.api_key.as_str());
        Self {
            obs,
            prometheus,
            api_key,
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/summary", get(get_summary))
        .route("/admin/export", get(get_export))
        .route("/admin/spans", get(get_spans))
        .route("/metrics", get(get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), track_api_calls))
        .layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the admin listener.
pub async fn bind(addr: &str) -> Result<TcpListener, AdminError> {
    TcpListener::bind(addr).await.map_err(|source| AdminError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve the admin router until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), AdminError> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
