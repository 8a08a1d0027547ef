//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - Liveness probe (is the gateway running?)
//! - /ready, /readyz - Readiness probe (can it serve progress traffic?)
//!
//! Liveness always returns 200 while the process is up. Readiness requires
//! MongoDB, except in dev mode where the gateway may run as a pure locale
//! router without a progress store.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response consumed by load balancers and the ops dashboard
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if the gateway is running)
    pub healthy: bool,
    /// 'online' when fully operational, 'degraded' without a database
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Database connection status
    pub database: DatabaseHealth,
    /// Error message if the database is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Database connection health details
#[derive(Serialize)]
pub struct DatabaseHealth {
    /// Whether MongoDB was reachable at startup
    pub connected: bool,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let args = &state.args;
    let db_connected = state.progress.is_some();

    let status = if db_connected || args.dev_mode {
        "online"
    } else {
        "degraded"
    };

    let error = if !db_connected {
        Some("MongoDB not connected - progress API unavailable".to_string())
    } else {
        None
    };

    HealthResponse {
        healthy: true,
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: args.node_id.to_string(),
        database: DatabaseHealth {
            connected: db_connected,
        },
        error,
    }
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    // Liveness probe: always return 200 if the gateway is running
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle readiness probe (/ready, /readyz)
///
/// Use this for load balancer health checks: a gateway without its
/// progress store should not take traffic in production.
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);

    let is_ready = response.database.connected || state.args.dev_mode;

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "scriptura-gateway",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
