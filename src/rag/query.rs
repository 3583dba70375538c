//! Question answering over the built index.
//!
//! Retrieval (embed + cosine top-k), context formatting with citations,
//! and a bounded-timeout generation call.

use std::sync::Arc;
use std::time::Duration;

use crate::embedding::Embedder;
use crate::errors::ApiError;
use crate::history::ConversationTurn;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

use super::store::{ChunkHit, VectorStore};

/// Retrieval and generation tuning, fixed at preload time.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub similarity_threshold: f32,
    pub max_history_turns: usize,
    pub llm_timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 4000,
            similarity_threshold: 0.3,
            max_history_turns: 6,
            llm_timeout: Duration::from_secs(60),
        }
    }
}

/// A generated answer with the sources that informed it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// The handles published by the preloader: vector index, embedding model,
/// and LLM client. Read-only after construction.
pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmProvider>,
    options: QueryOptions,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmProvider>,
        options: QueryOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            options,
        }
    }

    /// Answer `question` using retrieved context plus recent history.
    ///
    /// Fails with an upstream error when the generation call errors or
    /// exceeds the configured timeout; no partial answer, no retry.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, ApiError> {
        let query_embedding = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::internal("embedder returned no vector for the question"))?;

        let hits = self
            .store
            .search(&query_embedding, self.options.top_k)
            .await?;

        let relevant: Vec<&ChunkHit> = hits
            .iter()
            .filter(|hit| hit.score >= self.options.similarity_threshold)
            .collect();

        let context = format_context(&relevant, self.options.max_context_chars);
        let sources = collect_sources(&relevant);

        let request = ChatRequest::new(build_messages(
            question,
            history,
            self.options.max_history_turns,
        ))
        .with_system(system_prompt(&context))
        .with_temperature(0.0);

        let reply = tokio::time::timeout(self.options.llm_timeout, self.llm.chat(request))
            .await
            .map_err(|_| ApiError::Upstream("language model request timed out".to_string()))??;

        Ok(Answer {
            answer: reply,
            sources,
        })
    }
}

fn system_prompt(context: &str) -> String {
    if context.is_empty() {
        return "You are a helpful assistant answering questions about a textbook. \
                No relevant passages were retrieved for this question; say so when \
                you cannot answer from the book."
            .to_string();
    }

    format!(
        "You are a helpful assistant answering questions about a textbook. \
         Ground every answer in the passages below and cite passage numbers \
         where relevant. If the passages do not contain the answer, say so.\n\n\
         Passages:\n{}",
        context
    )
}

/// Format hits as a numbered, source-attributed context block bounded by
/// `max_chars`.
fn format_context(hits: &[&ChunkHit], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (i, hit) in hits.iter().enumerate() {
        let entry = format!(
            "[{}] (Source: {})\n{}\n\n",
            i + 1,
            hit.chunk.source,
            hit.chunk.content
        );

        if used + entry.len() > max_chars {
            break;
        }

        used += entry.len();
        context.push_str(&entry);
    }

    context.trim_end().to_string()
}

/// Distinct sources among the hits, in first-seen order.
fn collect_sources(hits: &[&ChunkHit]) -> Vec<String> {
    let mut sources = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.chunk.source) {
            sources.push(hit.chunk.source.clone());
        }
    }
    sources
}

/// The prior turns (bounded window) as alternating user/assistant
/// messages, followed by the current question.
fn build_messages(
    question: &str,
    history: &[ConversationTurn],
    max_turns: usize,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(max_turns);
    let mut messages = Vec::with_capacity((history.len() - start) * 2 + 1);

    for turn in &history[start..] {
        messages.push(ChatMessage::user(&turn.question));
        messages.push(ChatMessage::assistant(&turn.answer));
    }
    messages.push(ChatMessage::user(question));

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::StoredChunk;

    fn hit(content: &str, source: &str, score: f32) -> ChunkHit {
        ChunkHit {
            chunk: StoredChunk {
                chunk_id: "id".to_string(),
                content: content.to_string(),
                source: source.to_string(),
                chunk_index: 0,
            },
            score,
        }
    }

    fn turn(question: &str, answer: &str) -> ConversationTurn {
        ConversationTurn {
            id: 0,
            session_id: "default".to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_format_context_numbered_and_bounded() {
        let hits = vec![
            hit("First passage.", "ch1.txt", 0.9),
            hit("Second passage.", "ch2.txt", 0.8),
        ];
        let refs: Vec<&ChunkHit> = hits.iter().collect();

        let context = format_context(&refs, 4000);
        assert!(context.starts_with("[1] (Source: ch1.txt)"));
        assert!(context.contains("[2] (Source: ch2.txt)"));

        // A tight budget drops the tail rather than truncating mid-entry.
        let small = format_context(&refs, 40);
        assert!(small.contains("First passage."));
        assert!(!small.contains("Second passage."));
    }

    #[test]
    fn test_collect_sources_dedupes_in_order() {
        let hits = vec![
            hit("a", "ch2.txt", 0.9),
            hit("b", "ch1.txt", 0.8),
            hit("c", "ch2.txt", 0.7),
        ];
        let refs: Vec<&ChunkHit> = hits.iter().collect();
        assert_eq!(collect_sources(&refs), vec!["ch2.txt", "ch1.txt"]);
    }

    #[test]
    fn test_build_messages_windows_history() {
        let history = vec![turn("q1", "a1"), turn("q2", "a2"), turn("q3", "a3")];

        let messages = build_messages("current", &history, 2);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "q2");
        assert_eq!(messages[1].content, "a2");
        assert_eq!(messages[4].role, "user");
        assert_eq!(messages[4].content, "current");
    }

    #[test]
    fn test_build_messages_empty_history() {
        let messages = build_messages("only question", &[], 6);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "only question");
    }

    #[test]
    fn test_system_prompt_mentions_passages_only_when_present() {
        assert!(!system_prompt("").contains("Passages:"));
        assert!(system_prompt("[1] text").contains("Passages:"));
    }
}
