//! Groq chat-completions client (OpenAI-compatible wire format).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LlmError};
use crate::llm::LlmConfig;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

const PROVIDER: &str = "groq";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Live chat-completion provider.
///
/// The credential is checked on every call, so a provider built without a
/// key still constructs and fails each request with a configuration error.
pub struct GroqProvider {
    client: Client,
    api_key: Option<SecretString>,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl GroqProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            timeout: config.timeout,
        })
    }

    fn credential(&self) -> Result<&str, LlmError> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => Ok(key.expose_secret()),
            _ => Err(ConfigError::MissingRequired {
                key: "GROQ_API_KEY".to_string(),
                hint: "Set it in the environment or switch EMAIL_AGENT_MODE=mock.".to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let api_key = self.credential()?;

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = %self.model,
            temperature = request.temperature,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: if e.is_timeout() {
                    format!("timed out after {}s", self.timeout.as_secs())
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Chat completion request rejected");
            return Err(LlmError::Backend {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(extract_content(&text))
    }
}

/// Pull the first choice's content out of a completion envelope.
///
/// A malformed envelope is not an error: the raw body is handed on and the
/// stage's contract parser decides what to make of it.
fn extract_content(body: &str) -> String {
    let content = serde_json::from_str::<ChatResponse>(body)
        .ok()
        .and_then(|r| r.choices.into_iter().next())
        .and_then(|c| c.message.content);

    match content {
        Some(content) => content.trim().to_string(),
        None => {
            tracing::warn!(body, "Unexpected completion envelope, passing raw body through");
            body.trim().to_string()
        }
    }
}
