use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: bool,
}

/// GET /system/health
/// Liveness and database probe, public so load balancers can poll it.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.store().ping().await.is_ok();

    Json(ApiResponse::success(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
    }))
}

/// GET /admin/system/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let database = state.store().ping().await.is_ok();

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
    })))
}
