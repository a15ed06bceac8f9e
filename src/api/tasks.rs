use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    db::{models::BroneTask, queries},
    AppState,
};

#[derive(Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: BroneTask,
    pub is_urgent: bool,
    pub is_expired: bool,
}

impl TaskView {
    fn new(task: BroneTask, now: DateTime<Utc>) -> Self {
        TaskView {
            is_urgent: task.is_urgent(now),
            is_expired: task.is_expired(now),
            task,
        }
    }
}

/// GET /api/tasks  (pending only, nearest deadline first)
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    match queries::pending_tasks(&state.pool).await {
        Ok(tasks) => {
            let tasks: Vec<TaskView> = tasks.into_iter().map(|t| TaskView::new(t, now)).collect();
            Json(serde_json::json!({ "pending": tasks.len(), "tasks": tasks })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /api/tasks/:id/complete
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match queries::complete_task(&state.pool, &id, Utc::now()).await {
        Ok(true) => Json(serde_json::json!({ "ok": true, "id": id })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Task not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
