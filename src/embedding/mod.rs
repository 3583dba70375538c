//! Embedding provider abstraction.
//!
//! Retrieval embeddings run locally via fastembed (the `local-embeddings`
//! feature, on by default). The trait seam keeps the index and query paths
//! independent of the concrete model so tests can substitute a stub.

use async_trait::async_trait;

use crate::errors::ApiError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// return the embedding model name (e.g. "bge-small-en-v1.5")
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::Embedder;
    use crate::errors::ApiError;

    const EMBED_BATCH_SIZE: usize = 64;

    /// Local embedding model backed by fastembed. Model weights are
    /// downloaded on first use and cached by fastembed itself.
    pub struct FastEmbedder {
        model_name: String,
        // fastembed's embed() takes &mut self; calls are serialized and
        // moved off the async runtime via spawn_blocking.
        model: Arc<Mutex<fastembed::TextEmbedding>>,
    }

    impl FastEmbedder {
        /// Load the named model. Runs on a blocking thread since model
        /// initialization may download and deserialize weights.
        pub async fn load(model_name: &str) -> anyhow::Result<Self> {
            let name = model_name.to_string();
            let fastembed_model = model_from_name(&name)?;

            let model = tokio::task::spawn_blocking(move || {
                fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model)
                        .with_show_download_progress(false),
                )
                .map_err(|e| anyhow::anyhow!("failed to initialize embedding model: {}", e))
            })
            .await??;

            Ok(Self {
                model_name: name,
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    fn model_from_name(name: &str) -> anyhow::Result<fastembed::EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            other => anyhow::bail!("unknown embedding model: {}", other),
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = self.model.clone();
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| ApiError::internal("embedding model lock poisoned"))?;
                model
                    .embed(texts, Some(EMBED_BATCH_SIZE))
                    .map_err(ApiError::internal)
            })
            .await
            .map_err(ApiError::internal)?
        }
    }
}
