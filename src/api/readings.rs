use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    dashboard::history::HISTORY_CAPACITY,
    db::{models::NewReading, queries},
    telemetry::{TelemetryError, TelemetryService},
    AppState,
};

#[derive(Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<i64>,
}

/// GET /api/readings?limit=N  (newest first, capped at the chart window)
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ReadingsQuery>,
) -> impl IntoResponse {
    let cap = HISTORY_CAPACITY as i64;
    let limit = q.limit.unwrap_or(cap).clamp(1, cap);

    match queries::recent_readings(&state.pool, limit).await {
        Ok(readings) => Json(serde_json::json!({ "readings": readings })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /api/readings  (device upload)
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewReading>,
) -> impl IntoResponse {
    let svc = TelemetryService::new(state.pool.clone(), state.feed.clone());
    match svc.record_reading(req).await {
        Ok(reading) => (StatusCode::CREATED, Json(reading)).into_response(),
        Err(TelemetryError::Invalid(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to store reading: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
