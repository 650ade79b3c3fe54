//! Health check handlers

use axum::Json;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub pid: u32,
    pub version: String,
}

/// Liveness check, reachable without a token
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        pid: std::process::id(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Ping response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

/// Authenticated liveness check, used by clients to validate their token
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ok: true })
}
