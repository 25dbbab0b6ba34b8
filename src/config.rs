//! Configuration types.

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// What the ingestion pipeline does when a backend call fails for one email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole run; no partial results.
    #[default]
    Abort,
    /// Skip the failed email, record the failure, and keep going.
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(ConfigError::InvalidValue {
                key: "EMAIL_AGENT_FAILURE_POLICY".to_string(),
                message: format!("expected 'abort' or 'continue', got '{other}'"),
            }),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Backend selection and credentials.
    pub llm: LlmConfig,
    /// Per-email failure handling for ingestion runs.
    pub failure_policy: FailurePolicy,
}

impl AgentConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let failure_policy = match std::env::var("EMAIL_AGENT_FAILURE_POLICY") {
            Ok(s) => s.parse()?,
            Err(_) => FailurePolicy::default(),
        };

        Ok(Self {
            llm: LlmConfig::from_env()?,
            failure_policy,
        })
    }
}
