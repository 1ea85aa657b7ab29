//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /ready,  /readyz  - Readiness probe (is the store reachable?)
//!
//! Liveness always returns 200 while the process is up. Readiness pings
//! MongoDB when it is configured; in dev mode the in-memory stores are
//! always ready.

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub timestamp: String,
    pub mode: String,
    pub node_id: String,
    pub storage: StorageHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct StorageHealth {
    /// "mongodb" or "memory"
    pub backend: &'static str,
    pub connected: bool,
}

async fn build_health_response(state: &AppState) -> HealthResponse {
    let (backend, connected, error) = match &state.mongo {
        Some(mongo) => match mongo.ping().await {
            Ok(()) => ("mongodb", true, None),
            Err(e) => ("mongodb", false, Some(e.to_string())),
        },
        None => ("memory", true, None),
    };

    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        storage: StorageHealth { backend, connected },
        error,
    }
}

/// Handle liveness probe (/health, /healthz)
pub async fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    let response = build_health_response(&state).await;

    // Liveness probe: always 200 while the service is running
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Returns 503 when the configured store cannot be reached, so load
/// balancers stop routing traffic here until it recovers.
pub async fn readiness_check(state: Arc<AppState>) -> Response<BoxBody> {
    let response = build_health_response(&state).await;

    let status = if response.storage.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &response)
}
