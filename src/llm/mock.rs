//! Mock provider for running without a live credential.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// Fixed text returned by every mock completion.
pub const MOCK_RESPONSE: &str = "Mock LLM Response";

/// Provider that answers every request with [`MOCK_RESPONSE`] and never
/// touches the network.
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        tracing::debug!(
            messages = request.messages.len(),
            temperature = request.temperature,
            "Mock completion"
        );
        Ok(MOCK_RESPONSE.to_string())
    }
}
