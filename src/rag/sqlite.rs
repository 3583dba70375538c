//! SQLite-backed vector store.
//!
//! Chunk text and little-endian f32 embedding BLOBs live in one table;
//! search is brute-force cosine similarity over all rows, which is ample
//! for a single-textbook corpus.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkHit, StoredChunk, VectorStore};
use crate::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn open(db_path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                chunk_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            chunk_index: row.get("chunk_index"),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO index_chunks (chunk_id, content, source, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkHit>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, chunk_index, embedding FROM index_chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut hits: Vec<ChunkHit> = rows
            .iter()
            .filter_map(|row| {
                let blob: Option<Vec<u8>> = row.get("embedding");
                let embedding = Self::deserialize_embedding(&blob?);
                Some(ChunkHit {
                    chunk: Self::row_to_chunk(row),
                    score: Self::cosine_similarity(query_embedding, &embedding),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn count(&self) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM index_chunks")
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get(0))
            .map_err(ApiError::internal)?;
        Ok(count)
    }

    async fn clear(&self) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM index_chunks")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, ApiError> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, content: &str, source: &str, index: i64) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            chunk_index: index,
        }
    }

    async fn temp_store() -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteVectorStore::open(&dir.path().join("index.db"))
            .await
            .expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn test_insert_and_search_orders_by_similarity() {
        let (_dir, store) = temp_store().await;

        store
            .insert_batch(vec![
                (chunk("a", "about the sky", "doc.txt", 0), vec![1.0, 0.0, 0.0]),
                (chunk("b", "about the sea", "doc.txt", 1), vec![0.0, 1.0, 0.0]),
                (chunk("c", "about numbers", "doc.txt", 2), vec![0.0, 0.0, 1.0]),
            ])
            .await
            .expect("insert");

        let hits = store.search(&[0.9, 0.1, 0.0], 2).await.expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_count_and_clear() {
        let (_dir, store) = temp_store().await;

        store
            .insert_batch(vec![(chunk("a", "text", "doc.txt", 0), vec![1.0, 0.0])])
            .await
            .expect("insert");
        assert_eq!(store.count().await.expect("count"), 1);

        store.clear().await.expect("clear");
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_meta_roundtrip_and_overwrite() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.get_meta("fingerprint").await.expect("get"), None);

        store.set_meta("fingerprint", "abc").await.expect("set");
        store.set_meta("fingerprint", "def").await.expect("set");
        assert_eq!(
            store.get_meta("fingerprint").await.expect("get").as_deref(),
            Some("def")
        );
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let embedding = vec![0.25f32, -1.5, 3.75];
        let blob = SqliteVectorStore::serialize_embedding(&embedding);
        assert_eq!(SqliteVectorStore::deserialize_embedding(&blob), embedding);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(SqliteVectorStore::cosine_similarity(&[], &[]), 0.0);
        assert_eq!(
            SqliteVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0]),
            0.0
        );
        assert_eq!(
            SqliteVectorStore::cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]),
            0.0
        );
        let sim = SqliteVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
