//! Language-model provider seam.
//!
//! The pipeline only needs `classify(text) -> raw text`; everything the
//! provider returns is treated as untrusted and handed to the extractor.
mod client;
mod models;
mod prompt;

use async_trait::async_trait;
use thiserror::Error;

pub use client::OpenAiClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("llm request timed out")]
    Timeout,
    #[error("llm provider rate limited the request")]
    RateLimited,
    #[error("llm transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the raw model output for one transcript.
    async fn classify(&self, text: &str) -> Result<String, LlmError>;

    /// Cheap reachability probe used by the readiness endpoint.
    async fn health_check(&self) -> anyhow::Result<()>;
}
