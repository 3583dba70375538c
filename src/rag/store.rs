//! VectorStore trait — abstract interface for the chunk index.
//!
//! The primary implementation is [`crate::rag::sqlite::SqliteVectorStore`].
//! Handles are read-only after the preloader publishes them; the trait only
//! exists so the index and query paths can be exercised against stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// A stored, embedded chunk of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    /// Source identifier (file name).
    pub source: String,
    /// Chunk index within the source document.
    pub chunk_index: i64,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embedding vectors in one transaction.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Return the `limit` chunks most similar to the query embedding,
    /// best first.
    async fn search(&self, query_embedding: &[f32], limit: usize)
        -> Result<Vec<ChunkHit>, ApiError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<i64, ApiError>;

    /// Remove every stored chunk.
    async fn clear(&self) -> Result<(), ApiError>;

    /// Read an index metadata value (corpus fingerprint, model name).
    async fn get_meta(&self, key: &str) -> Result<Option<String>, ApiError>;

    /// Write an index metadata value.
    async fn set_meta(&self, key: &str, value: &str) -> Result<(), ApiError>;
}
