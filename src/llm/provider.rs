use async_trait::async_trait;

use super::types::ChatRequest;
use crate::errors::ApiError;

/// Abstraction over the hosted generation API, so request handlers and
/// tests never depend on a concrete vendor client.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "anthropic")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError>;
}
