use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::{
    brone::{self, SyncError},
    AppState,
};

/// POST /api/brone/sync
pub async fn sync(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.brone {
        Some(engine) => engine.run_to_response().await,
        None => brone::respond(Err(SyncError::NotConfigured)),
    }
}
