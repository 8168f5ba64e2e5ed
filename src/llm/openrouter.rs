//! OpenRouter (OpenAI-compatible) client with automatic retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{GenerateRequest, InferenceClient};
use crate::config::InferenceConfig;

/// OpenRouter chat-completions client.
pub struct OpenRouterClient {
    client: Client,
    config: InferenceConfig,
}

impl OpenRouterClient {
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

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("HTTP-Referer", "https://github.com/launch-orchestrator")
            .header("X-Title", "Launch Orchestrator");
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .authorize(
                self.client
                    .post(format!("{}/chat/completions", self.config.base_url)),
            )
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

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::Parse(format!("{}, body: {}", e, text))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

        tracing::debug!(
            "OpenRouter request successful, response length: {}",
            content.len()
        );
        Ok(content)
    }
}

#[async_trait]
impl InferenceClient for OpenRouterClient {
    async fn health_check(&self) -> bool {
        let probe = self
            .authorize(self.client.get(format!("{}/models", self.config.base_url)))
            .timeout(self.config.health_timeout)
            .send()
            .await;

        match probe {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("OpenRouter healthy, model {} configured", self.config.model);
                true
            }
            Ok(resp) => {
                tracing::warn!("OpenRouter health check failed with status {}", resp.status());
                false
            }
            Err(e) => {
                tracing::warn!("OpenRouter health check failed: {}", e);
                false
            }
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::debug!("Sending request to OpenRouter: model={}", self.config.model);

        let body = &body;
        self.config
            .retry
            .run("OpenRouter request", move || self.execute_request(body))
            .await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// OpenRouter API request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenRouter API response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
