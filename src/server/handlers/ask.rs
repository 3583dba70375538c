use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::history::DEFAULT_SESSION_ID;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub processing_time: f64,
}

/// `POST /api/ask` — answer one question against the indexed corpus.
///
/// Fails fast with the still-loading status until the preload has
/// published the engine; the language model is never invoked before that.
/// A history write failure is logged and does not discard the answer.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let engine = state.preloader.engine()?;
    let started = Instant::now();

    let turns = state
        .history
        .list_recent(
            DEFAULT_SESSION_ID,
            state.settings.max_history_turns as i64,
        )
        .await
        .unwrap_or_else(|err| {
            tracing::warn!("failed to read history, answering without it: {}", err);
            Vec::new()
        });

    let outcome = engine.answer(question, &turns).await?;

    if let Err(err) = state
        .history
        .append(DEFAULT_SESSION_ID, question, &outcome.answer)
        .await
    {
        tracing::warn!("failed to persist conversation turn: {}", err);
    }

    tracing::info!(
        elapsed = started.elapsed().as_secs_f64(),
        "answered question"
    );

    Ok(Json(AskResponse {
        question: question.to_string(),
        answer: outcome.answer,
        sources: outcome.sources,
        processing_time: started.elapsed().as_secs_f64(),
    }))
}
