//! Ollama client for local inference.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{GenerateRequest, InferenceClient};
use crate::config::InferenceConfig;

/// Client for an Ollama server's `/api/generate` endpoint.
pub struct OllamaClient {
    client: Client,
    config: InferenceConfig,
}

impl OllamaClient {
    pub fn new(mut config: InferenceConfig) -> Self {
        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });
        Self { client, config }
    }

    async fn execute_request(&self, body: &OllamaGenerate<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.request_timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.request_timeout))?;
        if !status.is_success() {
            return Err(LlmError::BadResponse {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: OllamaResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Parse(format!("{}, body: {}", e, text)))?;

        tracing::debug!(
            "Ollama request successful, response length: {}",
            parsed.response.len()
        );
        Ok(parsed.response)
    }

    async fn probe(&self) -> Result<Vec<String>, String> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("status {}", resp.status()));
        }

        let tags: OllamaTags = resp.json().await.map_err(|e| e.to_string())?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    /// Healthy only when the server answers and lists the configured model.
    async fn health_check(&self) -> bool {
        match self.probe().await {
            Ok(models) if models.iter().any(|m| m == &self.config.model) => true,
            Ok(models) => {
                tracing::warn!(
                    "Model {} not available. Available models: {:?}",
                    self.config.model,
                    models
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    "Ollama health check at {} failed: {}",
                    self.config.base_url,
                    e
                );
                false
            }
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let body = OllamaGenerate {
            model: &self.config.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        tracing::debug!("Sending request to Ollama: model={}", self.config.model);

        let body = &body;
        self.config
            .retry
            .run("Ollama request", move || self.execute_request(body))
            .await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerate<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
