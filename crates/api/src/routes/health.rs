//! Health check endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub broker: &'static str,
}

/// GET /health: returns system health status.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.store,
        broker: state.broker,
    })
}

/// GET /health/ready: opens and rolls back a storage session.
pub async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let mut session = state.sessions.begin().await?;
    session.rollback().await?;
    Ok(Json(HealthResponse {
        status: "ready",
        store: state.store,
        broker: state.broker,
    }))
}
