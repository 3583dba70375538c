//! One-time corpus index construction.
//!
//! Loads the document directory, chunks and embeds every file, and stores
//! the result in the vector store. A SHA-256 corpus fingerprint plus the
//! embedding model name are kept in the index metadata so an unchanged
//! corpus is not re-embedded on restart.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::chunker::TextChunker;
use super::store::{StoredChunk, VectorStore};
use crate::embedding::Embedder;

const META_FINGERPRINT: &str = "corpus_fingerprint";
const META_EMBEDDING_MODEL: &str = "embedding_model";

/// A raw corpus document before chunking.
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    /// File name relative to the data directory.
    pub source: String,
    pub text: String,
}

/// What the index build did.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub documents: usize,
    pub chunks: usize,
    /// True when the cached index matched the corpus and was reused.
    pub reused: bool,
}

/// Read every supported file under `data_dir` in a deterministic order.
///
/// `.txt`, `.md` and `.markdown` files are read as UTF-8; `.pdf` files go
/// through text extraction. Other extensions are skipped.
pub fn load_corpus(data_dir: &Path) -> Result<Vec<CorpusDocument>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(data_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let text = match ext.as_str() {
            "txt" | "md" | "markdown" => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            "pdf" => pdf_extract::extract_text(path).map_err(|e| {
                anyhow::anyhow!("failed to extract text from {}: {}", path.display(), e)
            })?,
            _ => continue,
        };

        let source = path
            .strip_prefix(data_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        if text.trim().is_empty() {
            tracing::warn!("skipping empty document: {}", source);
            continue;
        }

        documents.push(CorpusDocument { source, text });
    }

    if documents.is_empty() {
        bail!("no readable documents found in {}", data_dir.display());
    }

    Ok(documents)
}

/// SHA-256 over every document's name and contents, in load order.
pub fn corpus_fingerprint(documents: &[CorpusDocument]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Build (or reuse) the chunk index for `documents`.
pub async fn build_index(
    store: &Arc<dyn VectorStore>,
    embedder: &Arc<dyn Embedder>,
    chunker: &TextChunker,
    documents: &[CorpusDocument],
) -> Result<IndexSummary> {
    let fingerprint = corpus_fingerprint(documents);

    let cached_fingerprint = store.get_meta(META_FINGERPRINT).await?;
    let cached_model = store.get_meta(META_EMBEDDING_MODEL).await?;
    let stored = store.count().await?;

    if stored > 0
        && cached_fingerprint.as_deref() == Some(fingerprint.as_str())
        && cached_model.as_deref() == Some(embedder.model_name())
    {
        tracing::info!(chunks = stored, "index cache hit, skipping re-embed");
        return Ok(IndexSummary {
            documents: documents.len(),
            chunks: stored as usize,
            reused: true,
        });
    }

    store.clear().await?;

    let mut total_chunks = 0;
    for doc in documents {
        let chunks = chunker.split(&doc.text, &doc.source);
        if chunks.is_empty() {
            continue;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            bail!(
                "embedder returned {} vectors for {} chunks of {}",
                embeddings.len(),
                chunks.len(),
                doc.source
            );
        }

        let items = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                (
                    StoredChunk {
                        chunk_id: uuid::Uuid::new_v4().to_string(),
                        content: chunk.text,
                        source: chunk.source,
                        chunk_index: chunk.chunk_index as i64,
                    },
                    embedding,
                )
            })
            .collect::<Vec<_>>();

        total_chunks += items.len();
        store.insert_batch(items).await?;
        tracing::debug!(source = %doc.source, "indexed document");
    }

    store.set_meta(META_FINGERPRINT, &fingerprint).await?;
    store
        .set_meta(META_EMBEDDING_MODEL, embedder.model_name())
        .await?;

    tracing::info!(
        documents = documents.len(),
        chunks = total_chunks,
        "index build complete"
    );

    Ok(IndexSummary {
        documents: documents.len(),
        chunks: total_chunks,
        reused: false,
    })
}
