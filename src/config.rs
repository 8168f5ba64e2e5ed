//! Process configuration.
//!
//! Everything is read once at startup from environment variables and handed to
//! components explicitly; nothing looks configuration up at call time.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::RetryConfig;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_MODEL: &str = "deepseek/deepseek-chat";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "gemma3:4b";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which inference backend requests go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceProvider {
    OpenRouter,
    Ollama,
}

impl InferenceProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }

    fn default_request_timeout(&self) -> Duration {
        match self {
            Self::OpenRouter => Duration::from_secs(60),
            Self::Ollama => Duration::from_secs(120),
        }
    }
}

/// Inference client configuration. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub provider: InferenceProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Transport timeout for a single generation request.
    pub request_timeout: Duration,
    /// Timeout for the health probe, independent of `request_timeout`.
    pub health_timeout: Duration,
    pub retry: RetryConfig,
}

impl InferenceConfig {
    /// Provider defaults with no credential.
    pub fn for_provider(provider: InferenceProvider) -> Self {
        let (base_url, model) = match provider {
            InferenceProvider::OpenRouter => (OPENROUTER_BASE_URL, OPENROUTER_MODEL),
            InferenceProvider::Ollama => (OLLAMA_BASE_URL, OLLAMA_MODEL),
        };
        Self {
            provider,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            request_timeout: provider.default_request_timeout(),
            health_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounds applied by the orchestrator and task executor.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Bound on a single agent's inference work.
    pub task_timeout: Duration,
    /// Bound on the health probe run before each agent.
    pub health_timeout: Duration,
    /// Wall-clock budget for a whole run.
    pub run_timeout: Duration,
    /// Characters of each task's output quoted in the final report.
    pub report_excerpt_chars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(10),
            run_timeout: Duration::from_secs(30 * 60),
            report_excerpt_chars: 300,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub cors_origins: Vec<String>,
    pub inference: InferenceConfig,
    pub execution: ExecutionConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url_override = get("LLM_BASE_URL");
        let provider = match get("LLM_PROVIDER") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "openrouter" => InferenceProvider::OpenRouter,
                "ollama" => InferenceProvider::Ollama,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "LLM_PROVIDER",
                        value,
                        reason: "expected `openrouter` or `ollama`".to_string(),
                    })
                }
            },
            None => match &base_url_override {
                Some(url) if !url.contains("openrouter.ai") => InferenceProvider::Ollama,
                _ => InferenceProvider::OpenRouter,
            },
        };

        let mut inference = InferenceConfig::for_provider(provider);
        if let Some(url) = base_url_override {
            if let Err(e) = url::Url::parse(&url) {
                return Err(ConfigError::Invalid {
                    var: "LLM_BASE_URL",
                    value: url,
                    reason: e.to_string(),
                });
            }
            inference.base_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            inference.model = model;
        }
        inference.api_key = get("OPENROUTER_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        if let Some(secs) = parse_var::<u64>(&get, "LLM_TIMEOUT_SECS")? {
            inference.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "LLM_HEALTH_TIMEOUT_SECS")? {
            inference.health_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32>(&get, "LLM_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    var: "LLM_MAX_ATTEMPTS",
                    value: attempts.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            inference.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&get, "LLM_BACKOFF_BASE_MS")? {
            inference.retry.base_delay = Duration::from_millis(ms);
        }

        let mut execution = ExecutionConfig {
            health_timeout: inference.health_timeout,
            ..ExecutionConfig::default()
        };
        if let Some(secs) = parse_var::<u64>(&get, "AGENT_TIMEOUT_SECS")? {
            execution.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "WORKFLOW_TIMEOUT_SECS")? {
            execution.run_timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = parse_var::<usize>(&get, "REPORT_EXCERPT_CHARS")? {
            execution.report_excerpt_chars = chars;
        }

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:3001".to_string(),
                ]
            });

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var::<u16>(&get, "PORT")?.unwrap_or(8000),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./launch_orchestrator.db")),
            cors_origins,
            inference,
            execution,
        })
    }
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_target_openrouter() {
        let config = load(&[]).unwrap();
        assert_eq!(config.inference.provider, InferenceProvider::OpenRouter);
        assert_eq!(config.inference.model, "deepseek/deepseek-chat");
        assert_eq!(config.inference.request_timeout, Duration::from_secs(60));
        assert_eq!(config.execution.task_timeout, Duration::from_secs(120));
        assert_eq!(config.execution.run_timeout, Duration::from_secs(1800));
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_local_base_url_selects_ollama() {
        let config = load(&[("LLM_BASE_URL", "http://gpu-box:11434")]).unwrap();
        assert_eq!(config.inference.provider, InferenceProvider::Ollama);
        assert_eq!(config.inference.model, "gemma3:4b");
        assert_eq!(config.inference.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = load(&[
            ("LLM_PROVIDER", "ollama"),
            ("LLM_MODEL", "llama3:8b"),
            ("LLM_MAX_ATTEMPTS", "5"),
            ("LLM_HEALTH_TIMEOUT_SECS", "3"),
            ("AGENT_TIMEOUT_SECS", "30"),
            ("OPENAI_API_KEY", "sk-fallback"),
            ("CORS_ORIGINS", "https://app.example.com, "),
        ])
        .unwrap();
        assert_eq!(config.inference.model, "llama3:8b");
        assert_eq!(config.inference.retry.max_attempts, 5);
        assert_eq!(config.execution.health_timeout, Duration::from_secs(3));
        assert_eq!(config.execution.task_timeout, Duration::from_secs(30));
        assert_eq!(config.inference.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.cors_origins, vec!["https://app.example.com".to_string()]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("LLM_PROVIDER", "bard")]).is_err());
        assert!(load(&[("LLM_BASE_URL", "not a url")]).is_err());
        assert!(load(&[("LLM_MAX_ATTEMPTS", "0")]).is_err());
    }
}
