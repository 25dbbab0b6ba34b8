//! Shared types for the email processing pipeline.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Shown for a task whose deadline the model did not give.
pub const DEADLINE_NOT_SPECIFIED: &str = "Not specified";

// ── Email ───────────────────────────────────────────────────────────

/// An email as supplied by the inbox collaborator.
///
/// Identity is the position in the source collection. The engine never
/// mutates an `Email`; it only derives records from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub sender: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Email {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Parse an operator-typed email with `From:` / `Subject:` / `Body:` lines.
    ///
    /// Header names are case-insensitive. Everything from `Body:` onwards is
    /// the body, verbatim. A line that is not a known header also starts the
    /// body, so free text with no headers becomes a body-only email.
    pub fn from_raw(text: &str) -> Self {
        let mut sender = String::new();
        let mut subject = String::new();
        let mut body_lines: Vec<&str> = Vec::new();
        let mut in_body = false;

        for line in text.lines() {
            if in_body {
                body_lines.push(line);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = strip_header(line, "from:") {
                sender = rest.trim().to_string();
            } else if let Some(rest) = strip_header(line, "subject:") {
                subject = rest.trim().to_string();
            } else if let Some(rest) = strip_header(line, "body:") {
                in_body = true;
                let rest = rest.trim_start();
                if !rest.is_empty() {
                    body_lines.push(rest);
                }
            } else {
                in_body = true;
                body_lines.push(line);
            }
        }

        Self {
            sender,
            subject,
            body: body_lines.join("\n"),
            timestamp: String::new(),
        }
    }
}

fn strip_header<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    match trimmed.get(..name.len()) {
        Some(head) if head.eq_ignore_ascii_case(name) => Some(&trimmed[name.len()..]),
        _ => None,
    }
}

// ── Stage shapes ────────────────────────────────────────────────────

/// An action item extracted from an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl Task {
    pub fn new(task: impl Into<String>, deadline: Option<&str>) -> Self {
        Self {
            task: task.into(),
            deadline: deadline.map(str::to_string),
        }
    }

    /// Deadline for display, with the "Not specified" sentinel.
    pub fn deadline_or_default(&self) -> &str {
        self.deadline.as_deref().unwrap_or(DEADLINE_NOT_SPECIFIED)
    }
}

/// A drafted reply. Persisting it is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

/// Whether a stage's backend output matched its expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conformance {
    Conformed,
    /// The documented fallback value was substituted.
    FellBack { reason: String },
}

/// Value produced by a stage, tagged with its conformance.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<T> {
    pub value: T,
    pub conformance: Conformance,
}

impl<T> StageOutput<T> {
    pub fn conformed(value: T) -> Self {
        Self {
            value,
            conformance: Conformance::Conformed,
        }
    }

    pub fn fell_back(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            conformance: Conformance::FellBack {
                reason: reason.into(),
            },
        }
    }

    pub fn is_conformed(&self) -> bool {
        self.conformance == Conformance::Conformed
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

// ── Pipeline output ─────────────────────────────────────────────────

/// An email annotated by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEmail {
    #[serde(flatten)]
    pub email: Email,
    pub category: String,
    pub actions: Vec<Task>,
}

/// An email the pipeline skipped under `FailurePolicy::Continue`.
#[derive(Debug)]
pub struct EmailFailure {
    /// Position of the email in the input.
    pub index: usize,
    pub stage: &'static str,
    pub error: LlmError,
}

/// Result of an ingestion run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Successfully processed emails, in input order.
    pub processed: Vec<ProcessedEmail>,
    pub failures: Vec<EmailFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Wall-clock time the run took.
    pub fn duration(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}
