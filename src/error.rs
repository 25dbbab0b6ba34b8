//! Error types for the email agent.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
///
/// Only transport and configuration problems live here. A completion that
/// arrives but has the wrong shape is handled by the contract parser.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider {provider} returned {status}: {body}")]
    Backend {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
}

impl LlmError {
    /// True for errors caused by missing or invalid local configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed for email #{index}: {source}")]
    Stage {
        index: usize,
        stage: &'static str,
        #[source]
        source: LlmError,
    },
}

impl PipelineError {
    /// Position of the email that aborted the run.
    pub fn index(&self) -> usize {
        match self {
            Self::Stage { index, .. } => *index,
        }
    }
}
