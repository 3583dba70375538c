//! Question-answering backend for a fixed textbook corpus.
//!
//! A thin orchestration layer around a retrieval-augmented-generation
//! pipeline: local embeddings + SQLite vector index for retrieval, the
//! Anthropic Messages API for generation, SQLite for conversation history,
//! and an axum JSON API in front.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod history;
pub mod llm;
pub mod logging;
pub mod preload;
pub mod rag;
pub mod server;
pub mod state;
