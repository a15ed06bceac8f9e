use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::{settings::AlertSettings, AppState};

/// GET /api/settings/alerts
pub async fn get_alert_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = state.settings_tx.borrow().clone();
    Json(current)
}

/// PUT /api/settings/alerts
pub async fn update_alert_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AlertSettings>,
) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    if let Err(e) = state.settings.save(&req).await {
        tracing::error!("Failed to save alert settings: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Failed to save settings" })),
        )
            .into_response();
    }

    // Open dashboards pick the new thresholds up from the watch channel
    state.settings_tx.send_replace(req.clone());
    Json(req).into_response()
}
