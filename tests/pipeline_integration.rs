//! Integration tests for the ingestion pipeline and the live chat-completion client.
//!
//! Pipeline tests use scripted providers; client tests run the real HTTP
//! provider against a `wiremock` server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use email_agent::config::FailurePolicy;
use email_agent::error::{LlmError, PipelineError};
use email_agent::llm::{
    CompletionRequest, LlmConfig, LlmMode, LlmProvider, MOCK_RESPONSE, create_provider,
};
use email_agent::pipeline::{Email, EmailAgent, Task};
use email_agent::prompts::{
    CATEGORIZE_SYSTEM, EXTRACT_ACTIONS_SYSTEM, PromptSet, SharedPrompts, assemble,
};

// ── Fixtures ────────────────────────────────────────────────────────

fn inbox(n: usize) -> Vec<Email> {
    (1..=n)
        .map(|i| {
            Email::new(
                format!("sender{i}@example.com"),
                format!("Email {i}"),
                format!("Body of email {i}.\nPlease reply by Friday."),
                format!("2025-01-{i:02}T09:00:00Z"),
            )
        })
        .collect()
}

/// Provider that answers by stage and fails for one chosen subject.
struct ScriptedLlm {
    fail_subject: Option<String>,
    calls: AtomicUsize,
    categorize_prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new() -> Arc<Self> {
        Self::failing_on(None)
    }

    fn failing_on(subject: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            fail_subject: subject.map(str::to_string),
            calls: AtomicUsize::new(0),
            categorize_prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = request.messages[0].content.as_str();
        let user = request.messages[1].content.as_str();

        if let Some(subject) = &self.fail_subject
            && user.contains(&format!("Subject: {subject}\n"))
        {
            return Err(LlmError::Backend {
                provider: "scripted".into(),
                status: 503,
                body: "service unavailable".into(),
            });
        }

        if system == CATEGORIZE_SYSTEM {
            self.categorize_prompts
                .lock()
                .unwrap()
                .push(user.lines().next().unwrap_or_default().to_string());
            Ok("Important".to_string())
        } else if system == EXTRACT_ACTIONS_SYSTEM {
            Ok(r#"[{"task":"Reply","deadline":"Friday"}]"#.to_string())
        } else {
            Ok(String::new())
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn mock_mode_pipeline_is_idempotent() {
    let config = LlmConfig {
        mode: LlmMode::Mock,
        ..LlmConfig::default()
    };
    let agent = EmailAgent::new(create_provider(&config).unwrap());
    let emails = inbox(3);
    let prompts = PromptSet::default();

    let first = agent.run_pipeline(&emails, &prompts).await.unwrap();
    let second = agent.run_pipeline(&emails, &prompts).await.unwrap();

    assert_eq!(first, second);
    assert!(first.iter().all(|p| p.category == MOCK_RESPONSE));
    assert!(first.iter().all(|p| p.actions.is_empty()));
}

#[tokio::test]
async fn pipeline_preserves_order_and_length() {
    let llm = ScriptedLlm::new();
    let agent = EmailAgent::new(llm.clone());
    let emails = inbox(5);

    let processed = agent
        .run_pipeline(&emails, &PromptSet::default())
        .await
        .unwrap();

    assert_eq!(processed.len(), emails.len());
    for (result, email) in processed.iter().zip(&emails) {
        assert_eq!(&result.email, email);
        assert_eq!(result.category, "Important");
        assert_eq!(result.actions, vec![Task::new("Reply", Some("Friday"))]);
    }
    assert_eq!(llm.calls(), 10);
}

#[tokio::test]
async fn backend_error_on_second_email_aborts_run() {
    let llm = ScriptedLlm::failing_on(Some("Email 2"));
    let agent = EmailAgent::new(llm.clone());

    let result = agent.run_pipeline(&inbox(5), &PromptSet::default()).await;

    let err = result.expect_err("a failed email must abort the run");
    let PipelineError::Stage {
        index,
        stage,
        source,
    } = err;
    assert_eq!(index, 1);
    assert_eq!(stage, "categorize");
    match source {
        LlmError::Backend { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "service unavailable");
        }
        other => panic!("Expected Backend error, got {other:?}"),
    }
    // Email 1 (two calls) plus the failing call; nothing after it
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn continue_policy_collects_failures() {
    let llm = ScriptedLlm::failing_on(Some("Email 2"));
    let agent = EmailAgent::new(llm.clone());
    let emails = inbox(5);

    let report = agent
        .run_pipeline_with_policy(&emails, &PromptSet::default(), FailurePolicy::Continue)
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.processed.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].stage, "categorize");

    let subjects: Vec<&str> = report
        .processed
        .iter()
        .map(|p| p.email.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["Email 1", "Email 3", "Email 4", "Email 5"]);
    assert!(report.finished_at >= report.started_at);
}

#[tokio::test]
async fn categorize_end_to_end() {
    struct ImportantLlm;

    #[async_trait]
    impl LlmProvider for ImportantLlm {
        fn model_name(&self) -> &str {
            "important"
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok("Important".to_string())
        }
    }

    let agent = EmailAgent::new(Arc::new(ImportantLlm));
    let prompts = PromptSet {
        categorization_prompt: "Categorize into: Important, Spam".into(),
        ..PromptSet::default()
    };
    let email = Email::new(
        "manager@company.com",
        "Budget meeting",
        "Let's meet Monday at 10 AM to finalize the Q3 budget.",
        "2025-02-01T08:30:00Z",
    );

    let category = agent.categorize(&email, &prompts).await.unwrap();
    assert_eq!(category.value, "Important");
}

#[tokio::test]
async fn shared_prompt_edits_apply_to_later_stages() {
    /// Edits the shared prompts after the first categorize call.
    struct EditingLlm {
        prompts: SharedPrompts,
        inner: Arc<ScriptedLlm>,
    }

    #[async_trait]
    impl LlmProvider for EditingLlm {
        fn model_name(&self) -> &str {
            "editing"
        }
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            let out = self.inner.complete(request).await;
            if self.inner.calls() == 1 {
                self.prompts
                    .update(|p| p.categorization_prompt = "Categorize into: Urgent, Later".into())
                    .await;
            }
            out
        }
    }

    let shared = SharedPrompts::new(PromptSet::default());
    let scripted = ScriptedLlm::new();
    let agent = EmailAgent::new(Arc::new(EditingLlm {
        prompts: shared.clone(),
        inner: scripted.clone(),
    }));

    agent.run_pipeline(&inbox(2), &shared).await.unwrap();

    let seen = scripted.categorize_prompts.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            PromptSet::default().categorization_prompt,
            "Categorize into: Urgent, Later".to_string(),
        ]
    );
}

// ── Live client ─────────────────────────────────────────────────────

fn live_config(server: &MockServer, key: Option<&str>) -> LlmConfig {
    LlmConfig {
        mode: LlmMode::Live,
        api_key: key.map(SecretString::from),
        model: "llama-3.1-8b-instant".to_string(),
        endpoint: format!("{}/openai/v1/chat/completions", server.uri()),
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn live_request_shape_and_trimmed_content() {
    let server = MockServer::start().await;
    let prompts = PromptSet::default();
    let email = inbox(1).remove(0);

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "model": "llama-3.1-8b-instant",
            "messages": [
                {"role": "system", "content": CATEGORIZE_SYSTEM},
                {"role": "user", "content": assemble(&prompts.categorization_prompt, &email)}
            ],
            "temperature": 0.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "\n  Newsletter  \n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = EmailAgent::new(create_provider(&live_config(&server, Some("test-key"))).unwrap());
    let category = agent.categorize(&email, &prompts).await.unwrap();
    assert_eq!(category.value, "Newsletter");
}

#[tokio::test]
async fn live_error_status_is_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_api_key"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let provider = create_provider(&live_config(&server, Some("bad-key"))).unwrap();
    let err = provider
        .complete(CompletionRequest::from_instruction("s", "u"))
        .await
        .unwrap_err();

    match err {
        LlmError::Backend { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_api_key"));
        }
        other => panic!("Expected Backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn live_malformed_envelope_reaches_contract_parser() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let agent = EmailAgent::new(create_provider(&live_config(&server, Some("test-key"))).unwrap());
    let email = inbox(1).remove(0);

    let actions = agent
        .extract_actions(&email, &PromptSet::default())
        .await
        .unwrap();
    assert!(actions.value.is_empty());
    assert!(!actions.is_conformed());

    let draft = agent
        .draft_reply(&email, &PromptSet::default(), "Short")
        .await
        .unwrap();
    assert_eq!(draft.value.subject, "Re:");
    assert_eq!(draft.value.body, r#"{"choices":[]}"#);
}

#[tokio::test]
async fn live_without_key_fails_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let agent = EmailAgent::new(create_provider(&live_config(&server, None)).unwrap());
    let err = agent
        .run_pipeline(&inbox(2), &PromptSet::default())
        .await
        .unwrap_err();

    let PipelineError::Stage { index, source, .. } = err;
    assert_eq!(index, 0);
    assert!(source.is_configuration());
}
