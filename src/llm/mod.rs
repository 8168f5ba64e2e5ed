//! Inference client module for talking to text-generation services.
//!
//! This module provides a trait-based abstraction over inference providers,
//! with an OpenAI-compatible OpenRouter client and a local Ollama client.
//! Both apply a per-request timeout and the bounded retry in [`RetryConfig`].

mod error;
mod ollama;
mod openrouter;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{InferenceConfig, InferenceProvider};

/// A single text-generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Sampling temperature (0 = deterministic).
    pub temperature: f64,
    /// Maximum output tokens to generate.
    pub max_tokens: u32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Trait for inference clients.
///
/// Clients are stateless per call; their configuration is fixed at construction.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Lightweight probe. Fails closed: any network error, non-2xx status or
    /// probe timeout yields `false`.
    async fn health_check(&self) -> bool;

    /// Generate text for the request.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;

    /// Model identifier requests are sent with.
    fn model(&self) -> &str;
}

/// Shared client handle.
pub type ClientRef = Arc<dyn InferenceClient>;

/// Build the client selected by configuration.
pub fn build_client(config: &InferenceConfig) -> ClientRef {
    match config.provider {
        InferenceProvider::OpenRouter => Arc::new(OpenRouterClient::new(config.clone())),
        InferenceProvider::Ollama => Arc::new(OllamaClient::new(config.clone())),
    }
}
