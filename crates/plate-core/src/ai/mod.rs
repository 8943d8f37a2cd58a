//! Pluggable text-generation backend
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all generation backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai, openai_compatible, mock). Default: openai
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (default: https://api.openai.com)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//!
//! The API key is not read here; it is a [`Credential`](crate::credentials::Credential)
//! fetched per request and attached with [`AIClient::with_api_key`].

mod mock;
mod openai_compatible;

pub use mock::{MockBackend, MOCK_MENU};
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all generation backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send `prompt` as a single user message and return the generated text
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI or any server implementing `/v1/chat/completions`
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    pub fn from_env() -> Self {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai".to_string());

        match backend.to_lowercase().as_str() {
            "openai" | "openai_compatible" => {
                AIClient::OpenAICompatible(OpenAICompatibleBackend::from_env())
            }
            "mock" => AIClient::Mock(MockBackend::new()),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai");
                AIClient::OpenAICompatible(OpenAICompatibleBackend::from_env())
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Copy of this client that authenticates with `api_key`
    pub fn with_api_key(&self, api_key: &str) -> Self {
        match self {
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_api_key(api_key)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.generate(prompt).await,
            AIClient::Mock(b) => b.generate(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
