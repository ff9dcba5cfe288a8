//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: String,
    /// Server version from Cargo.toml
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Service name
    #[schema(example = "certify-server")]
    pub service: String,
    /// Storage backend: "postgres" or "memory"
    #[schema(example = "postgres")]
    pub storage: String,
    /// Ledger backend: "evm" or "memory"
    #[schema(example = "evm")]
    pub ledger: String,
    /// Whether the chain node answered
    pub chain_available: bool,
}

/// Service health
///
/// Returns JSON with service status, version, and chain availability.
/// Used for monitoring and load balancer health checks.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let chain_available = match state.ledger.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(ledger = state.ledger.name(), error = %e, "Chain health check failed");
            false
        }
    };

    let status = if chain_available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "certify-server".to_string(),
        storage: state.db.backend_name().to_string(),
        ledger: state.ledger.name().to_string(),
        chain_available,
    })
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readiness probe
///
/// Returns 200 when storage is reachable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready", body = ReadyResponse),
        (status = 503, description = "Storage unreachable", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("Database unreachable".to_string()),
                }),
            )
        }
    }
}

/// Root banner
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Certify API is running",
        "docs": "/docs",
    }))
}
