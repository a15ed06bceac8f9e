use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::{db::queries, schedule, AppState};

#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub day: Option<String>,
}

/// GET /api/schedule?day=Senin  (defaults to today on the campus clock)
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ScheduleQuery>,
) -> impl IntoResponse {
    let day = match q.day.as_deref() {
        Some(label) => match schedule::normalize_day(label) {
            Some(day) => day,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": format!("Unknown day: {}", label) })),
                )
                    .into_response()
            }
        },
        None => schedule::today(Utc::now(), state.tz_offset),
    };

    match queries::list_schedule(&state.pool).await {
        Ok(all) => Json(schedule::day_view(all, day)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
