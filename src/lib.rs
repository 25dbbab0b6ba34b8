//! Email Agent: prompt-driven email triage core.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
