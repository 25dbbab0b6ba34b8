//! Contract parsing for stage outputs.
//!
//! Each stage expects its completion text in one shape. The whole text must
//! parse; nothing is searched for inside it. Parsing returns
//! `Result<Shape, ContractViolation>`, and the `*_or_fallback`
//! functions resolve a violation to the stage's fixed fallback value, so a
//! stage always hands back a well-shaped value.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::pipeline::types::{Draft, StageOutput, Task};

/// Subject used when a draft has to be rebuilt from raw text.
pub const FALLBACK_SUBJECT: &str = "Re:";

/// Structural type a stage's output must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractShape {
    Label,
    TaskList,
    ReplyObject,
}

impl ContractShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::TaskList => "task list",
            Self::ReplyObject => "reply object",
        }
    }
}

impl std::fmt::Display for ContractShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion text that does not match its stage's shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{shape} contract violated: {reason}")]
pub struct ContractViolation {
    pub shape: ContractShape,
    pub reason: String,
    /// The completion text as received.
    pub raw: String,
}

impl ContractViolation {
    fn new(shape: ContractShape, reason: impl Into<String>, raw: &str) -> Self {
        Self {
            shape,
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

// ── Label ───────────────────────────────────────────────────────────

/// Categories are free text; the label is returned unchanged.
pub fn parse_label(raw: &str) -> String {
    raw.to_string()
}

// ── Task list ───────────────────────────────────────────────────────

/// Tasks recovered from a task-list payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    /// Items that had no usable `task` text and were left out.
    pub dropped: usize,
}

/// Parse a task list. A single task object is wrapped into a list.
///
/// Items are coerced one by one: a string is a task with no deadline, an
/// object needs a non-blank string `task`, and a scalar `deadline` is kept
/// as text. Items that cannot be coerced are dropped and counted; the rest
/// survive.
pub fn parse_tasks(raw: &str) -> Result<TaskList, ContractViolation> {
    let items = match parse_json::<Value>(raw, ContractShape::TaskList)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ContractViolation::new(
                ContractShape::TaskList,
                format!("expected a list or an object, got {}", json_kind(&other)),
                raw,
            ));
        }
    };

    let total = items.len();
    let tasks: Vec<Task> = items.into_iter().filter_map(task_from_value).collect();
    Ok(TaskList {
        dropped: total - tasks.len(),
        tasks,
    })
}

fn task_from_value(value: Value) -> Option<Task> {
    let (task, deadline) = match value {
        Value::String(task) => (task, None),
        Value::Object(mut fields) => match fields.remove("task") {
            Some(Value::String(task)) => (task, fields.remove("deadline").and_then(scalar_text)),
            _ => return None,
        },
        _ => return None,
    };
    if task.trim().is_empty() {
        return None;
    }
    Some(Task { task, deadline })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolve a task-list parse.
///
/// A violation becomes an empty list. A list with dropped items keeps its
/// usable tasks but is reported as a fallback.
pub fn tasks_or_fallback(parsed: Result<TaskList, ContractViolation>) -> StageOutput<Vec<Task>> {
    match parsed {
        Ok(TaskList { tasks, dropped: 0 }) => StageOutput::conformed(tasks),
        Ok(TaskList { tasks, dropped }) => {
            warn!(
                kept = tasks.len(),
                dropped,
                "Dropped task items without a usable task"
            );
            StageOutput::fell_back(tasks, format!("{dropped} task item(s) had no usable task"))
        }
        Err(violation) => {
            warn!(
                raw = %violation.raw,
                reason = %violation.reason,
                "Action extraction returned no usable task list, using empty list"
            );
            StageOutput::fell_back(Vec::new(), violation.to_string())
        }
    }
}

// ── Reply object ────────────────────────────────────────────────────

/// Parse a reply object with `subject` and `body`.
pub fn parse_draft(raw: &str) -> Result<Draft, ContractViolation> {
    parse_json(raw, ContractShape::ReplyObject)
}

/// Resolve a draft parse; a violation keeps the raw text as the body.
pub fn draft_or_fallback(parsed: Result<Draft, ContractViolation>) -> StageOutput<Draft> {
    match parsed {
        Ok(draft) => StageOutput::conformed(draft),
        Err(violation) => {
            warn!(
                reason = %violation.reason,
                "Draft was not a reply object, using raw text as body"
            );
            let reason = violation.to_string();
            let draft = Draft {
                subject: FALLBACK_SUBJECT.to_string(),
                body: violation.raw,
                follow_ups: Vec::new(),
            };
            StageOutput::fell_back(draft, reason)
        }
    }
}

// ── JSON ────────────────────────────────────────────────────────────

/// Parse the whole completion text as JSON of type `T`.
///
/// Text around the payload (prose, markdown fences) is a violation.
fn parse_json<T: DeserializeOwned>(
    raw: &str,
    shape: ContractShape,
) -> Result<T, ContractViolation> {
    serde_json::from_str(raw).map_err(|e| ContractViolation::new(shape, e.to_string(), raw))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
