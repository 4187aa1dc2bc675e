use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mongodb::bson::doc;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

/// Process-wide Prometheus recorder handle
static METRICS_HANDLE: once_cell::sync::OnceCell<PrometheusHandle> =
    once_cell::sync::OnceCell::new();

/// Install the process-wide Prometheus recorder. Idempotent.
pub fn install_metrics_recorder() -> anyhow::Result<()> {
    METRICS_HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .map_err(anyhow::Error::from)
    })?;
    Ok(())
}

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "docbridge",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
/// Returns 200 once the MongoDB deployment answers a ping
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    state.db.run_command(doc! { "ping": 1 }).await?;

    Ok(Json(json!({
        "status": "ready",
        "service": "docbridge",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "mongodb": "ready",
        }
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics() -> ServerResult<String> {
    match METRICS_HANDLE.get() {
        Some(handle) => Ok(handle.render()),
        None => Err(ServerError::Config(
            "metrics recorder not installed".to_string(),
        )),
    }
}
