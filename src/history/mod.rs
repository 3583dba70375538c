//! Durable conversation history.
//!
//! The interface is session-scoped even though this deployment runs a
//! single implicit session, so multi-session support never requires an
//! interface change. Turns are append-only; insertion order is
//! chronological order.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

pub use sqlite::SqliteHistoryStore;

/// The single session used by this deployment.
pub const DEFAULT_SESSION_ID: &str = "default";

/// One recorded question/answer pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: String,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record one turn; returns its row id.
    async fn append(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<i64, ApiError>;

    /// The most recent `limit` turns in chronological order. A
    /// non-positive limit returns the full history.
    async fn list_recent(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationTurn>, ApiError>;

    /// Delete every turn in the session; returns the number removed.
    async fn clear(&self, session_id: &str) -> Result<u64, ApiError>;

    /// Number of turns recorded for the session.
    async fn count(&self, session_id: &str) -> Result<i64, ApiError>;
}
