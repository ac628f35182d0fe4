pub mod payments;
pub mod webhook;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub usage_percent: f32,
}

#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub db_pool: DbPoolStats,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 query
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let pool = &state.db;
    let active_connections = pool.size();
    let idle_connections = pool.num_idle();
    let max_connections = pool.options().get_max_connections();
    let usage_percent = (active_connections as f32 / max_connections as f32) * 100.0;

    let pool_stats = DbPoolStats {
        active_connections,
        idle_connections: idle_connections as u32,
        max_connections,
        usage_percent,
    };

    let health_response = HealthStatus {
        status: if db_status == "connected" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
        db_pool: pool_stats,
    };

    let status_code = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
