use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::{ConversationTurn, HistoryStore};
use crate::errors::ApiError;

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub async fn open(db_path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session_id
             ON conversation_turns(session_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> ConversationTurn {
        ConversationTurn {
            id: row.get("id"),
            session_id: row.get("session_id"),
            question: row.get("question"),
            answer: row.get("answer"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<i64, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO conversation_turns (session_id, question, answer, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(question)
        .bind(answer)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    async fn list_recent(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationTurn>, ApiError> {
        let rows = if limit > 0 {
            sqlx::query(
                "SELECT * FROM (
                     SELECT * FROM conversation_turns
                     WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
                 ) ORDER BY id ASC",
            )
            .bind(session_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?
        } else {
            sqlx::query("SELECT * FROM conversation_turns WHERE session_id = ?1 ORDER BY id ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::internal)?
        };

        Ok(rows.iter().map(Self::row_to_turn).collect())
    }

    async fn clear(&self, session_id: &str) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected())
    }

    async fn count(&self, session_id: &str) -> Result<i64, ApiError> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) FROM conversation_turns WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .map(|r| r.get(0))
                .map_err(ApiError::internal)?;
        Ok(count)
    }
}
