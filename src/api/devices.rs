use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    db::{models::HeartbeatPatch, queries},
    telemetry::{TelemetryError, TelemetryService},
    AppState,
};

/// GET /api/device  (the single monitored device)
pub async fn get_device(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match queries::first_device(&state.pool).await {
        Ok(Some(device)) => Json(device).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "No device registered" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /api/devices/:id/heartbeat
///
/// Body is optional; an empty patch just marks the device online.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    patch: Option<Json<HeartbeatPatch>>,
) -> impl IntoResponse {
    let patch = patch.map(|Json(p)| p).unwrap_or_default();
    let svc = TelemetryService::new(state.pool.clone(), state.feed.clone());

    match svc.heartbeat(&id, patch).await {
        Ok(device) => Json(device).into_response(),
        Err(TelemetryError::Invalid(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
