//! Email processing pipeline.
//!
//! Every email flows through:
//! 1. `prompts::assemble()`: operator template + rendered email
//! 2. `LlmProvider::complete()`: one backend call per stage
//! 3. `contract`: strict parse, then the stage's fallback on violation
//!
//! `EmailAgent::run_pipeline()` applies categorize + extract-actions to a
//! whole inbox, one email at a time.

pub mod contract;
pub mod processor;
pub mod types;

pub use contract::{ContractShape, ContractViolation, TaskList};
pub use processor::EmailAgent;
pub use types::{
    Conformance, Draft, Email, EmailFailure, PipelineReport, ProcessedEmail, StageOutput, Task,
};
