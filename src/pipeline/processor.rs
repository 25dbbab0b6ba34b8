//! Email processor: runs prompt-driven stages against an LLM provider.
//!
//! Every stage follows the same flow:
//! 1. Take one `PromptSet` snapshot from the caller's `PromptSource`
//! 2. Assemble user content from the operator's template and the email
//! 3. One completion call with the stage's system instruction and temperature
//! 4. Coerce the completion into the stage's shape (or its fallback)
//!
//! Backend and configuration errors are returned as-is. Shape problems are
//! never errors; they show up as `Conformance::FellBack`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::FailurePolicy;
use crate::error::{LlmError, PipelineError};
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::pipeline::contract::{
    draft_or_fallback, parse_draft, parse_label, parse_tasks, tasks_or_fallback,
};
use crate::pipeline::types::{
    Draft, Email, EmailFailure, PipelineReport, ProcessedEmail, StageOutput, Task,
};
use crate::prompts::{
    ANSWER_SYSTEM, CATEGORIZE_SYSTEM, DRAFT_REPLY_SYSTEM, EXTRACT_ACTIONS_SYSTEM, PromptSource,
    SUMMARY_SYSTEM, assemble, assemble_question, assemble_reply, render_email,
};

/// Temperature for categorization (deterministic).
const CATEGORIZE_TEMPERATURE: f32 = 0.0;

/// Temperature for action extraction (deterministic).
const EXTRACT_TEMPERATURE: f32 = 0.0;

/// Temperature for reply drafting.
const DRAFT_TEMPERATURE: f32 = 0.3;

/// Temperature for free-form answers.
const ANSWER_TEMPERATURE: f32 = 0.3;

/// Temperature for summaries.
const SUMMARY_TEMPERATURE: f32 = 0.2;

pub const STAGE_CATEGORIZE: &str = "categorize";
pub const STAGE_EXTRACT_ACTIONS: &str = "extract_actions";

/// Prompt-driven email agent.
///
/// Holds only the provider; prompts are passed in on every call.
pub struct EmailAgent {
    llm: Arc<dyn LlmProvider>,
}

impl EmailAgent {
    /// Create a new agent over an LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    async fn call(
        &self,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest::from_instruction(system, user).with_temperature(temperature);
        self.llm.complete(request).await
    }

    /// Classify an email with the operator's categorization prompt.
    pub async fn categorize<P>(
        &self,
        email: &Email,
        prompts: &P,
    ) -> Result<StageOutput<String>, LlmError>
    where
        P: PromptSource + ?Sized,
    {
        let prompts = prompts.snapshot().await;
        let user = assemble(&prompts.categorization_prompt, email);
        let raw = self.call(CATEGORIZE_SYSTEM, user, CATEGORIZE_TEMPERATURE).await?;
        Ok(StageOutput::conformed(parse_label(&raw)))
    }

    /// Extract action items. Unusable output yields an empty list.
    pub async fn extract_actions<P>(
        &self,
        email: &Email,
        prompts: &P,
    ) -> Result<StageOutput<Vec<Task>>, LlmError>
    where
        P: PromptSource + ?Sized,
    {
        let prompts = prompts.snapshot().await;
        let user = assemble(&prompts.action_item_prompt, email);
        let raw = self.call(EXTRACT_ACTIONS_SYSTEM, user, EXTRACT_TEMPERATURE).await?;
        Ok(tasks_or_fallback(parse_tasks(&raw)))
    }

    /// Draft a reply in the given tone. Any tone string is accepted.
    ///
    /// Output that is not a `{subject, body}` object becomes the body of a
    /// draft with subject `"Re:"`.
    pub async fn draft_reply<P>(
        &self,
        email: &Email,
        prompts: &P,
        tone: &str,
    ) -> Result<StageOutput<Draft>, LlmError>
    where
        P: PromptSource + ?Sized,
    {
        let prompts = prompts.snapshot().await;
        let user = assemble_reply(&prompts.auto_reply_prompt, tone, email);
        let raw = self.call(DRAFT_REPLY_SYSTEM, user, DRAFT_TEMPERATURE).await?;
        Ok(draft_or_fallback(parse_draft(&raw)))
    }

    /// Answer a free-form question about an email, using all prompts as context.
    pub async fn answer_question<P>(
        &self,
        email: &Email,
        question: &str,
        prompts: &P,
    ) -> Result<StageOutput<String>, LlmError>
    where
        P: PromptSource + ?Sized,
    {
        let prompts = prompts.snapshot().await;
        let user = assemble_question(email, question, &prompts);
        let raw = self.call(ANSWER_SYSTEM, user, ANSWER_TEMPERATURE).await?;
        Ok(StageOutput::conformed(raw))
    }

    /// Summarize an email in two or three sentences.
    pub async fn summarize(&self, email: &Email) -> Result<StageOutput<String>, LlmError> {
        let user = render_email(email);
        let raw = self.call(SUMMARY_SYSTEM, user, SUMMARY_TEMPERATURE).await?;
        Ok(StageOutput::conformed(raw))
    }

    /// Categorize and extract actions for one email.
    async fn process_one<P>(
        &self,
        email: &Email,
        prompts: &P,
    ) -> Result<ProcessedEmail, (&'static str, LlmError)>
    where
        P: PromptSource + ?Sized,
    {
        let category = self
            .categorize(email, prompts)
            .await
            .map_err(|e| (STAGE_CATEGORIZE, e))?
            .into_value();
        let actions = self
            .extract_actions(email, prompts)
            .await
            .map_err(|e| (STAGE_EXTRACT_ACTIONS, e))?
            .into_value();

        Ok(ProcessedEmail {
            email: email.clone(),
            category,
            actions,
        })
    }

    /// Run the ingestion pipeline, aborting on the first backend error.
    ///
    /// The result has one entry per input email, in input order. If any
    /// call fails, no partial results are returned.
    pub async fn run_pipeline<P>(
        &self,
        emails: &[Email],
        prompts: &P,
    ) -> Result<Vec<ProcessedEmail>, PipelineError>
    where
        P: PromptSource + ?Sized,
    {
        self.run_pipeline_with_policy(emails, prompts, FailurePolicy::Abort)
            .await
            .map(|report| report.processed)
    }

    /// Run the ingestion pipeline under an explicit failure policy.
    ///
    /// Emails are processed strictly one after another. Under
    /// `FailurePolicy::Continue`, failed emails are left out of
    /// `processed` and listed in `failures`; this never returns `Err`.
    pub async fn run_pipeline_with_policy<P>(
        &self,
        emails: &[Email],
        prompts: &P,
        policy: FailurePolicy,
    ) -> Result<PipelineReport, PipelineError>
    where
        P: PromptSource + ?Sized,
    {
        let started_at = Utc::now();
        info!(
            count = emails.len(),
            policy = ?policy,
            model = self.llm.model_name(),
            "Running ingestion pipeline"
        );

        let mut processed = Vec::with_capacity(emails.len());
        let mut failures = Vec::new();

        for (index, email) in emails.iter().enumerate() {
            match self.process_one(email, prompts).await {
                Ok(result) => {
                    debug!(
                        index,
                        category = %result.category,
                        actions = result.actions.len(),
                        "Email processed"
                    );
                    processed.push(result);
                }
                Err((stage, source)) => match policy {
                    FailurePolicy::Abort => {
                        error!(index, stage, error = %source, "Aborting ingestion pipeline");
                        return Err(PipelineError::Stage {
                            index,
                            stage,
                            source,
                        });
                    }
                    FailurePolicy::Continue => {
                        error!(index, stage, error = %source, "Skipping email after stage failure");
                        failures.push(EmailFailure {
                            index,
                            stage,
                            error: source,
                        });
                    }
                },
            }
        }

        info!(
            processed = processed.len(),
            failed = failures.len(),
            total = emails.len(),
            "Ingestion pipeline complete"
        );

        Ok(PipelineReport {
            processed,
            failures,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
