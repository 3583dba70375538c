use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::history::DEFAULT_SESSION_ID;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// `GET /api/history` — the most recent turns in chronological order.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let turns = state.history.list_recent(DEFAULT_SESSION_ID, limit).await?;

    Ok(Json(json!({ "turns": turns })))
}

/// `POST /api/reset` — drop the session's conversation history.
pub async fn reset(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.history.clear(DEFAULT_SESSION_ID).await?;
    tracing::info!(removed, "conversation history reset");

    Ok(Json(json!({ "status": "ok", "removed": removed })))
}
