use std::path::{Path, PathBuf};

use anyhow::Context;

use email_agent::config::AgentConfig;
use email_agent::llm::{LlmMode, create_provider};
use email_agent::pipeline::{Draft, Email, EmailAgent, PipelineReport, StageOutput, Task};
use email_agent::prompts::PromptSet;

const USAGE: &str = "usage: email-agent [inbox.json] [prompts.json]\n       email-agent try <email.txt> [prompts.json]";

/// Tone used by `try` when EMAIL_AGENT_TONE is unset.
const DEFAULT_TONE: &str = "Professional";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1).peekable();
    let trial = args.next_if(|arg| arg == "try").is_some();
    let input_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None if trial => anyhow::bail!("{USAGE}"),
        None => std::env::var("EMAIL_AGENT_INBOX")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("inbox.json")),
    };
    let prompts_path = args
        .next()
        .or_else(|| std::env::var("EMAIL_AGENT_PROMPTS").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("prompts.json"));

    let config = AgentConfig::from_env()?;

    eprintln!("📧 Email Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mode: {}",
        match config.llm.mode {
            LlmMode::Live => format!("live ({})", config.llm.model),
            LlmMode::Mock => "mock".to_string(),
        }
    );
    eprintln!(
        "   {}: {}",
        if trial { "Test email" } else { "Inbox" },
        input_path.display()
    );
    eprintln!("   Prompts: {}", prompts_path.display());
    eprintln!("   Failure policy: {:?}\n", config.failure_policy);

    let prompts = load_prompts(&prompts_path).await?;
    let llm = create_provider(&config.llm)?;
    let agent = EmailAgent::new(llm);

    if trial {
        let email = load_test_email(&input_path).await?;
        let tone = std::env::var("EMAIL_AGENT_TONE").unwrap_or_else(|_| DEFAULT_TONE.to_string());
        let category = agent.categorize(&email, &prompts).await?;
        let actions = agent.extract_actions(&email, &prompts).await?;
        let draft = agent.draft_reply(&email, &prompts, &tone).await?;
        print!("{}", render_trial(&category, &actions, &draft));
        return Ok(());
    }

    let emails = load_inbox(&input_path).await?;
    let report = agent
        .run_pipeline_with_policy(&emails, &prompts, config.failure_policy)
        .await?;

    print!("{}", render_report(&report));
    Ok(())
}

/// Read an operator-typed email (`From:` / `Subject:` / `Body:` lines).
async fn load_test_email(path: &Path) -> anyhow::Result<Email> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read test email {}", path.display()))?;
    Ok(Email::from_raw(&text))
}

/// Read the inbox file. A missing file is an empty inbox.
async fn load_inbox(path: &Path) -> anyhow::Result<Vec<Email>> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Inbox file not found, starting empty");
        return Ok(Vec::new());
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read inbox {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid inbox JSON in {}", path.display()))
}

/// Read the prompts file, falling back to the stock prompts.
async fn load_prompts(path: &Path) -> anyhow::Result<PromptSet> {
    if !path.exists() {
        return Ok(PromptSet::default());
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompts {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(PromptSet::default());
    }
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid prompts JSON in {}", path.display()))
}

fn render_report(report: &PipelineReport) -> String {
    let mut out = String::new();

    for processed in &report.processed {
        let email = &processed.email;
        out.push_str(&format!("📩 {}\n", email.subject));
        out.push_str(&format!("   From: {}\n", email.sender));
        if !email.timestamp.is_empty() {
            out.push_str(&format!("   Time: {}\n", email.timestamp));
        }
        out.push_str(&format!("   Category: {}\n", processed.category));
        if !processed.actions.is_empty() {
            out.push_str("   Action Items:\n");
            for task in &processed.actions {
                out.push_str(&format!(
                    "   - {} (Deadline: {})\n",
                    task.task,
                    task.deadline_or_default()
                ));
            }
        }
        out.push('\n');
    }

    for failure in &report.failures {
        out.push_str(&format!(
            "⚠ Email #{} skipped ({}): {}\n",
            failure.index, failure.stage, failure.error
        ));
    }

    out.push_str(&format!(
        "Processed {} of {} email(s) in {:.2}s\n",
        report.processed.len(),
        report.processed.len() + report.failures.len(),
        report.duration().num_milliseconds() as f64 / 1000.0
    ));

    out
}

fn render_trial(
    category: &StageOutput<String>,
    actions: &StageOutput<Vec<Task>>,
    draft: &StageOutput<Draft>,
) -> String {
    let mut out = format!("Category: {}\n", category.value);

    out.push_str("Action Items:\n");
    if actions.value.is_empty() {
        out.push_str("   (none)\n");
    }
    for task in &actions.value {
        out.push_str(&format!(
            "   - {} (Deadline: {})\n",
            task.task,
            task.deadline_or_default()
        ));
    }
    if !actions.is_conformed() {
        out.push_str("   ⚠ action item output was not a clean task list\n");
    }

    out.push_str(&format!("Draft Subject: {}\n", draft.value.subject));
    out.push_str(&format!("Draft Body:\n{}\n", draft.value.body));
    if !draft.is_conformed() {
        out.push_str("⚠ draft output was not a reply object; showing raw text\n");
    }

    out
}
