//! Operator-editable prompts and prompt assembly.
//!
//! Stage operations never read prompts from process-wide state. Callers
//! pass a [`PromptSource`]; each stage takes one snapshot of it when it
//! starts and uses that snapshot for its single backend call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::pipeline::types::Email;

/// System instruction for categorization.
pub const CATEGORIZE_SYSTEM: &str = "You classify emails into categories.";

/// System instruction for action-item extraction.
pub const EXTRACT_ACTIONS_SYSTEM: &str = "Extract action items only in valid JSON list.";

/// System instruction for reply drafting.
pub const DRAFT_REPLY_SYSTEM: &str = "Draft email reply strictly in JSON with subject and body.";

/// System instruction for free-form questions about an email.
pub const ANSWER_SYSTEM: &str = "You are an Email Productivity Agent.";

/// System instruction for summaries.
pub const SUMMARY_SYSTEM: &str = "You are an email summarization assistant. Summarize the email in 2-3 sentences, capturing the key points and any action items. Be direct and factual. Do not include greetings or sign-offs.";

/// The three prompts an operator edits to steer the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub categorization_prompt: String,
    pub action_item_prompt: String,
    pub auto_reply_prompt: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            categorization_prompt: "Categorize emails into: Important, Newsletter, Spam, To-Do."
                .to_string(),
            action_item_prompt: "Extract action items in JSON list format.".to_string(),
            auto_reply_prompt: "Draft a professional reply email.".to_string(),
        }
    }
}

/// Anything a stage can take a consistent `PromptSet` snapshot from.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn snapshot(&self) -> PromptSet;
}

#[async_trait]
impl PromptSource for PromptSet {
    async fn snapshot(&self) -> PromptSet {
        self.clone()
    }
}

/// Prompts shared between the operator and a running pipeline.
///
/// Edits become visible to the next stage invocation, never to one that is
/// already in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedPrompts {
    inner: Arc<RwLock<PromptSet>>,
}

impl SharedPrompts {
    pub fn new(prompts: PromptSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(prompts)),
        }
    }

    /// Replace the whole prompt set.
    pub async fn replace(&self, prompts: PromptSet) {
        *self.inner.write().await = prompts;
    }

    /// Edit the prompt set in place.
    pub async fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut PromptSet) + Send,
    {
        let mut guard = self.inner.write().await;
        edit(&mut *guard);
    }
}

#[async_trait]
impl PromptSource for SharedPrompts {
    async fn snapshot(&self) -> PromptSet {
        self.inner.read().await.clone()
    }
}

// ── Assembly ────────────────────────────────────────────────────────

/// Canonical text rendering of an email. The body is passed through as-is.
pub fn render_email(email: &Email) -> String {
    format!(
        "From: {}\nSubject: {}\nBody:\n{}",
        email.sender, email.subject, email.body
    )
}

/// Template followed by the rendered email.
///
/// Nothing in the email is escaped; a body containing `EMAIL:` or role-like
/// text reaches the model unchanged.
pub fn assemble(template: &str, email: &Email) -> String {
    format!("{template}\n\nEMAIL:\n{}", render_email(email))
}

/// User content for reply drafting: the template, then the tone, then the email.
pub fn assemble_reply(template: &str, tone: &str, email: &Email) -> String {
    assemble(&format!("{template}\nTone: {tone}"), email)
}

/// User content for a free-form question, with every prompt as context.
pub fn assemble_question(email: &Email, question: &str, prompts: &PromptSet) -> String {
    format!(
        "EMAIL:\n{email}\n\nUSER QUESTION:\n{question}\n\nPROMPTS:\n\
         Categorization: {cat}\n\
         Action Extraction: {act}\n\
         Reply Draft: {reply}",
        email = render_email(email),
        cat = prompts.categorization_prompt,
        act = prompts.action_item_prompt,
        reply = prompts.auto_reply_prompt,
    )
}
