use crate::config::{Config, Provider};
use crate::gemini::GeminiModel;
use crate::openai::OpenAiModel;
use crate::utils::{retry, RetryPolicy};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {}", excerpt(.body))]
    Status { status: StatusCode, body: String },
    #[error("response missing content")]
    MissingContent,
    #[error("timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("no models configured")]
    NoModels,
}

/// Longest slice of an upstream error body carried into messages.
const ERROR_BODY_CHARS: usize = 120;

/// Upstream bodies can carry quota and project details; keep messages short.
fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= ERROR_BODY_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(ERROR_BODY_CHARS).collect();
    format!("{}...", head)
}

impl ProviderError {
    /// Transport failures, timeouts, throttling and server errors are worth
    /// another attempt; other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::Timeout(_) | ProviderError::MissingContent => {
                true
            }
            ProviderError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ProviderError::NoModels => false,
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Tries each model in order, each under its own retry budget.
pub struct FallbackChain {
    models: Vec<Arc<dyn CompletionModel>>,
    policy: RetryPolicy,
}

impl FallbackChain {
    pub fn new(models: Vec<Arc<dyn CompletionModel>>, policy: RetryPolicy) -> Self {
        Self { models, policy }
    }

    /// Build one provider client per configured model identifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.models.is_empty() {
            return Err(anyhow!("no models configured; set `models` or COMPLEXITY_AI_MODELS"));
        }
        if config.api_key.is_empty() {
            warn!(
                "API key for {} is empty; model calls will fail and return fallback records",
                config.provider
            );
        }
        let client = Client::builder().build()?;
        let models = config
            .models
            .iter()
            .map(|model| -> Arc<dyn CompletionModel> {
                match config.provider {
                    Provider::Gemini => Arc::new(GeminiModel::new(
                        client.clone(),
                        model.clone(),
                        config.api_key.clone(),
                        config.api_url.clone(),
                    )),
                    Provider::OpenAi => Arc::new(OpenAiModel::new(
                        client.clone(),
                        model.clone(),
                        config.api_key.clone(),
                        config.api_url.clone(),
                    )),
                }
            })
            .collect();
        Ok(Self::new(models, config.retry_policy()))
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }
}

#[async_trait]
impl CompletionModel for FallbackChain {
    fn name(&self) -> &str {
        self.models.first().map(|m| m.name()).unwrap_or("none")
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::NoModels;
        for (index, model) in self.models.iter().enumerate() {
            match retry(model.name(), &self.policy, || model.complete(prompt)).await {
                Ok(text) => {
                    if index > 0 {
                        info!("served by fallback model {}", model.name());
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!("model {} unavailable: {}", model.name(), e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
