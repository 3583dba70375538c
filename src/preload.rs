//! One-shot background preload with readiness gating.
//!
//! The expensive startup work (index build, embedding model load, LLM
//! client construction) runs on a single spawned task so the listener can
//! accept connections immediately. Handlers never wait on the task; they
//! check readiness and fail fast.
//!
//! Publication ordering: the worker writes the engine handle under the
//! status lock, then release-stores the readiness flag. Readers
//! acquire-load the flag before touching the handle, so a true flag always
//! observes a published engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::errors::ApiError;
use crate::llm::{AnthropicProvider, LlmProvider};
use crate::rag::chunker::TextChunker;
use crate::rag::index::{build_index, load_corpus};
use crate::rag::{QueryEngine, QueryOptions, SqliteVectorStore, VectorStore};

enum PreloadStatus {
    Pending,
    Ready(Arc<QueryEngine>),
    Failed(String),
}

pub struct Preloader {
    started: AtomicBool,
    ready: AtomicBool,
    status: RwLock<PreloadStatus>,
}

impl Default for Preloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Preloader {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            status: RwLock::new(PreloadStatus::Pending),
        }
    }

    /// Spawn the preload worker. Returns false (and does nothing) when a
    /// preload is already in flight or finished — at most one build runs
    /// per process lifetime.
    pub fn start<F, Fut>(self: &Arc<Self>, build: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<QueryEngine>> + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("preload already started, ignoring");
            return false;
        }

        let this = self.clone();
        tokio::spawn(async move {
            match build().await {
                Ok(engine) => {
                    *this
                        .status
                        .write()
                        .expect("preload status lock poisoned") = PreloadStatus::Ready(Arc::new(engine));
                    this.ready.store(true, Ordering::Release);
                    tracing::info!("preload complete, accepting questions");
                }
                Err(err) => {
                    // Terminal for this process: readiness stays false, the
                    // error stays inspectable, no automatic retry.
                    tracing::error!("preload failed: {:#}", err);
                    *this
                        .status
                        .write()
                        .expect("preload status lock poisoned") =
                        PreloadStatus::Failed(format!("{:#}", err));
                }
            }
        });

        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The published engine, or NotReady while the preload is pending or
    /// has failed.
    pub fn engine(&self) -> Result<Arc<QueryEngine>, ApiError> {
        if !self.is_ready() {
            return Err(ApiError::NotReady);
        }

        match &*self.status.read().expect("preload status lock poisoned") {
            PreloadStatus::Ready(engine) => Ok(engine.clone()),
            _ => Err(ApiError::NotReady),
        }
    }

    /// The terminal preload error, if the worker failed.
    pub fn last_error(&self) -> Option<String> {
        match &*self.status.read().expect("preload status lock poisoned") {
            PreloadStatus::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

/// The preload work itself: open the vector store, load the embedding
/// model, build or reuse the corpus index, and construct the LLM client.
pub async fn build_engine(settings: Arc<Settings>) -> Result<QueryEngine> {
    let store: Arc<dyn VectorStore> = Arc::new(
        SqliteVectorStore::open(&settings.index_db_path())
            .await
            .context("failed to open index database")?,
    );

    let embedder = load_embedder(&settings).await?;

    let data_dir = settings.data_dir.clone();
    let documents = tokio::task::spawn_blocking(move || load_corpus(&data_dir))
        .await
        .context("corpus loading task failed")??;

    let chunker = TextChunker::new(settings.chunk_size, settings.chunk_overlap);
    let summary = build_index(&store, &embedder, &chunker, &documents).await?;
    tracing::info!(
        documents = summary.documents,
        chunks = summary.chunks,
        reused = summary.reused,
        "index ready"
    );

    let llm: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(
        settings.api_key.clone(),
        settings.model.clone(),
    ));

    Ok(QueryEngine::new(
        store,
        embedder,
        llm,
        QueryOptions {
            top_k: settings.top_k,
            max_context_chars: settings.max_context_chars,
            similarity_threshold: settings.similarity_threshold,
            max_history_turns: settings.max_history_turns,
            llm_timeout: Duration::from_secs(settings.llm_timeout_secs),
        },
    ))
}

#[cfg(feature = "local-embeddings")]
async fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedder = crate::embedding::FastEmbedder::load(&settings.embedding_model)
        .await
        .context("failed to load embedding model")?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "local-embeddings"))]
async fn load_embedder(_settings: &Settings) -> Result<Arc<dyn Embedder>> {
    anyhow::bail!("this build has no embedding backend; enable the local-embeddings feature")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::rag::store::{ChunkHit, StoredChunk};

    struct NullStore;

    #[async_trait]
    impl VectorStore for NullStore {
        async fn insert_batch(
            &self,
            _items: Vec<(StoredChunk, Vec<f32>)>,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn search(
            &self,
            _query_embedding: &[f32],
            _limit: usize,
        ) -> Result<Vec<ChunkHit>, ApiError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<i64, ApiError> {
            Ok(0)
        }

        async fn clear(&self) -> Result<(), ApiError> {
            Ok(())
        }

        async fn get_meta(&self, _key: &str) -> Result<Option<String>, ApiError> {
            Ok(None)
        }

        async fn set_meta(&self, _key: &str, _value: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        fn model_name(&self) -> &str {
            "null"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    struct NullLlm;

    #[async_trait]
    impl crate::llm::LlmProvider for NullLlm {
        fn name(&self) -> &str {
            "null"
        }

        async fn chat(&self, _request: crate::llm::ChatRequest) -> Result<String, ApiError> {
            Ok("ok".to_string())
        }
    }

    fn test_engine() -> QueryEngine {
        QueryEngine::new(
            Arc::new(NullStore),
            Arc::new(NullEmbedder),
            Arc::new(NullLlm),
            QueryOptions::default(),
        )
    }

    async fn wait_ready(preloader: &Arc<Preloader>) {
        for _ in 0..200 {
            if preloader.is_ready() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("preloader never became ready");
    }

    #[tokio::test]
    async fn test_engine_unavailable_before_start() {
        let preloader = Arc::new(Preloader::new());
        assert!(!preloader.is_ready());
        assert!(matches!(preloader.engine(), Err(ApiError::NotReady)));
        assert!(preloader.last_error().is_none());
    }

    #[tokio::test]
    async fn test_ready_after_successful_build() {
        let preloader = Arc::new(Preloader::new());
        assert!(preloader.start(|| async { Ok(test_engine()) }));

        wait_ready(&preloader).await;
        assert!(preloader.engine().is_ok());
        assert!(preloader.last_error().is_none());
        // Once ready, always ready.
        assert!(preloader.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_starts_build_once() {
        let preloader = Arc::new(Preloader::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut accepted = 0;
        let mut handles = Vec::new();
        for _ in 0..4 {
            let preloader = preloader.clone();
            let builds = builds.clone();
            handles.push(tokio::spawn(async move {
                preloader.start(move || async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(test_engine())
                })
            }));
        }
        for handle in handles {
            if handle.await.expect("join") {
                accepted += 1;
            }
        }

        wait_ready(&preloader).await;
        assert_eq!(accepted, 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        // A post-completion start is also a no-op.
        assert!(!preloader.start(|| async { Ok(test_engine()) }));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_terminal_and_inspectable() {
        let preloader = Arc::new(Preloader::new());
        preloader.start(|| async { anyhow::bail!("corpus directory is empty") });

        for _ in 0..200 {
            if preloader.last_error().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(!preloader.is_ready());
        assert!(matches!(preloader.engine(), Err(ApiError::NotReady)));
        let err = preloader.last_error().expect("error recorded");
        assert!(err.contains("corpus directory is empty"));
    }
}
