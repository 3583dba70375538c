use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::errors::ApiError;
use crate::history::DEFAULT_SESSION_ID;
use crate::state::AppState;

/// `GET /health` — liveness plus the preload readiness flag.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut body = json!({
        "status": "ok",
        "ready": state.preloader.is_ready(),
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Some(err) = state.preloader.last_error() {
        body["last_preload_error"] = json!(err);
    }

    Json(body)
}

/// `GET /api/status` — readiness plus basic service counters.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let total_turns = state
        .history
        .count(DEFAULT_SESSION_ID)
        .await
        .unwrap_or(0);

    Ok(Json(json!({
        "ready": state.preloader.is_ready(),
        "total_turns": total_turns,
        "model": state.settings.model,
        "embedding_model": state.settings.embedding_model,
    })))
}
