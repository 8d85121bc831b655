//! Chat-completion gateway.
//!
//! Defines the [`ChatModel`] trait and its implementations:
//! - **[`DisabledChat`]**: always returns [`LlmError::Disabled`]; callers
//!   fall back to the local heuristics without logging a warning.
//! - **[`OpenAiChat`]**: calls `POST {base_url}/chat/completions` with
//!   retry and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, … (capped at 2^5), up to `llm.max_retries`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is disabled")]
    Disabled,
    #[error("{0} environment variable not set")]
    MissingApiKey(String),
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, LlmError::Disabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier recorded in prompt logs and reports.
    fn model_name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Send the conversation and return the assistant's text.
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = LlmError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    };
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "chat completion failed, will retry");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "chat completion transport error");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LlmError::InvalidResponse("chat completion failed after retries".to_string())
        }))
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn parse_completion(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))
}

/// Build the configured model. A missing API key disables the model
/// instead of failing, so the portal keeps serving local results.
pub fn create_model(config: &LlmConfig) -> anyhow::Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => match OpenAiChat::new(config) {
            Ok(model) => Ok(Arc::new(model)),
            Err(e) => match e.downcast_ref::<LlmError>() {
                Some(LlmError::MissingApiKey(var)) => {
                    warn!(env = %var, "API key not set; LLM steps disabled");
                    Ok(Arc::new(DisabledChat))
                }
                _ => Err(e),
            },
        },
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "hello");
        assert!(parse_completion(&serde_json::json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_model() {
        let model = create_model(&LlmConfig::default()).unwrap();
        assert!(!model.is_enabled());
        let err = model.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(err.is_disabled());
    }

    #[test]
    fn test_missing_api_key_disables_model() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            api_key_env: "PORTAL_TEST_UNSET_API_KEY".to_string(),
            ..LlmConfig::default()
        };
        let model = create_model(&config).unwrap();
        assert!(!model.is_enabled());
        assert_eq!(model.model_name(), "disabled");
    }
}
