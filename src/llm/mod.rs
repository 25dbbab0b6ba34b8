//! LLM integration for the email agent.
//!
//! Supports:
//! - **Groq**: OpenAI-compatible chat completions over HTTPS
//! - **Mock**: fixed response, no network, for running without a credential

mod groq;
pub mod mock;
pub mod provider;

pub use groq::GroqProvider;
pub use mock::{MOCK_RESPONSE, MockProvider};
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConfigError, LlmError};

/// Default model when `GROQ_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default bounded wait for a single completion call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Live backend or canned mock responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmMode {
    #[default]
    Live,
    Mock,
}

impl std::str::FromStr for LlmMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigError::InvalidValue {
                key: "EMAIL_AGENT_MODE".to_string(),
                message: format!("expected 'live' or 'mock', got '{other}'"),
            }),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub mode: LlmMode,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mode: LlmMode::Live,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    /// Build config from environment variables.
    ///
    /// A missing key is not an error here; live calls report it when made.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match std::env::var("EMAIL_AGENT_MODE") {
            Ok(s) => s.parse()?,
            Err(_) => LlmMode::Live,
        };

        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let endpoint =
            std::env::var("GROQ_API_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        let timeout_secs = match std::env::var("EMAIL_AGENT_TIMEOUT_SECS") {
            Ok(s) => s.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_AGENT_TIMEOUT_SECS".to_string(),
                message: e.to_string(),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            mode,
            api_key,
            model,
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.mode {
        LlmMode::Mock => {
            tracing::info!("Using mock LLM (no network)");
            Ok(Arc::new(MockProvider::new()))
        }
        LlmMode::Live => {
            if config.api_key.is_none() {
                tracing::warn!("GROQ_API_KEY not set; live completions will fail");
            }
            tracing::info!("Using Groq (model: {})", config.model);
            Ok(Arc::new(GroqProvider::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("MOCK".parse::<LlmMode>().unwrap(), LlmMode::Mock);
        assert_eq!(" live ".parse::<LlmMode>().unwrap(), LlmMode::Live);
        assert!("offline".parse::<LlmMode>().is_err());
    }

    #[test]
    fn default_config_uses_fixed_endpoint_and_timeout() {
        let config = LlmConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn create_mock_provider() {
        let config = LlmConfig {
            mode: LlmMode::Mock,
            ..LlmConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "mock");
    }

    #[test]
    fn create_live_provider_without_key_still_constructs() {
        // The credential is checked when a request is made.
        let provider = create_provider(&LlmConfig::default()).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_MODEL);
    }
}
