use axum::extract::State;
use serde::Serialize;

use crate::{
    error::{ApiResponse, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness plus a store round trip; a failing store surfaces as 500
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthStatus> {
    state.store.health_check().await?;
    Ok(ApiResponse::ok(
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
        "healthy",
    ))
}
