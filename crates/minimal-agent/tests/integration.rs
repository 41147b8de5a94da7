//! Integration tests for the minimal-agent crate.
//!
//! The runner is wired the same way the binary wires it: built-in tools in
//! a registry, a planner, and the SQLite-backed memory and run stores. Only
//! the model providers are replaced by in-process fakes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use minimal_agent::tools::{EmailMessage, SEND_EMAIL};
use minimal_agent::{
    AgentError, AgentRequest, AgentRunner, EmailSender, EmailTool, Generation, GenerationRequest,
    GenerateTool, Planner, PlannerConfig, Provider, RunnerConfig, StoreMemory, TextGenerator,
    ToolRegistry,
};
use minimal_store::{Database, MemoryStore, RunStore};
use serde_json::json;

// ═══════════════════════════════════════════════════════════════════════
//  Fakes
// ═══════════════════════════════════════════════════════════════════════

/// Answers every prompt with `"{provider}: {prompt}"`.
struct EchoModel {
    provider: Provider,
    calls: AtomicU32,
}

impl EchoModel {
    fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for EchoModel {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(&self, request: &GenerationRequest) -> minimal_agent::Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Generation {
            text: format!("{}: {}", self.provider, request.prompt),
            tokens_used: 20,
            latency_ms: 1,
            model: request.model.clone(),
        })
    }
}

/// Planning model with a canned reply, or a failing one.
struct CannedPlanner {
    reply: Option<String>,
    calls: AtomicU32,
}

#[async_trait]
impl TextGenerator for CannedPlanner {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, request: &GenerationRequest) -> minimal_agent::Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(Generation {
                text: text.clone(),
                tokens_used: 300,
                latency_ms: 5,
                model: request.model.clone(),
            }),
            None => Err(AgentError::LlmRequestFailed {
                reason: "upstream timeout".into(),
            }),
        }
    }
}

struct NullMailer;

#[async_trait]
impl EmailSender for NullMailer {
    async fn send(&self, _message: &EmailMessage) -> minimal_agent::Result<String> {
        Ok("sent".into())
    }
}

struct Harness {
    runner: AgentRunner,
    runs: RunStore,
    memory: MemoryStore,
    groq: Arc<EchoModel>,
    gemini: Arc<EchoModel>,
    planner_model: Arc<CannedPlanner>,
}

async fn harness(plan_reply: Option<String>) -> Harness {
    let db = Database::in_memory_migrated().await.unwrap();
    let runs = RunStore::new(db.clone());
    let memory = MemoryStore::new(db);

    let groq = EchoModel::new(Provider::Groq);
    let gemini = EchoModel::new(Provider::Gemini);
    let planner_model = Arc::new(CannedPlanner {
        reply: plan_reply,
        calls: AtomicU32::new(0),
    });

    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(GenerateTool::new(
            Some(groq.clone() as Arc<dyn TextGenerator>),
            Some(gemini.clone() as Arc<dyn TextGenerator>),
        )))
        .unwrap();
    registry
        .register(Arc::new(EmailTool::new(Some(
            Arc::new(NullMailer) as Arc<dyn EmailSender>
        ))))
        .unwrap();

    let planner = Planner::new(
        Some(planner_model.clone() as Arc<dyn TextGenerator>),
        PlannerConfig::default(),
    );
    let runner = AgentRunner::new(
        Arc::new(registry),
        Arc::new(planner),
        Arc::new(StoreMemory::new(memory.clone())),
        Arc::new(runs.clone()),
        RunnerConfig::default(),
    );

    Harness {
        runner,
        runs,
        memory,
        groq,
        gemini,
        planner_model,
    }
}

fn request(session: &str, prompt: &str) -> AgentRequest {
    AgentRequest {
        session_id: session.into(),
        user_id: "user-1".into(),
        prompt: prompt.into(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn simple_question_runs_one_fast_step() {
    let h = harness(None).await;

    let result = h
        .runner
        .run(&request("s1", "What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(h.planner_model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.groq.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.gemini.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.response, "groq: What is the capital of France?");
    assert_eq!(result.steps_executed.len(), 1);
    assert_eq!(result.models_used, vec!["openai/gpt-oss-120b".to_string()]);

    let stored = h.runs.get_request(&result.request_id).await.unwrap();
    assert_eq!(stored.intent, "simple");
    assert_eq!(stored.strategy, "agent_single");

    let steps = h.runs.list_steps(&result.request_id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].step_type, "agent_tool:llm_generate");
    assert_eq!(steps[0].input_prompt, "What is the capital of France?");

    let response = h.runs.get_response(&result.request_id).await.unwrap().unwrap();
    assert_eq!(response.final_response, result.response);
    assert_eq!(response.models_used["strategy"], "agent");

    let entries = h.memory.session_entries("s1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].plan_summary.as_ref().unwrap().steps_count, 1);
}

#[tokio::test]
async fn multi_step_plan_threads_outputs() {
    let reply = json!({
        "goal": "Research and summarize",
        "complexity": "moderate",
        "reasoning": "Gather facts, then condense them",
        "steps": [
            {"step_id": 0, "tool_name": "llm_generate", "description": "Research",
             "args": {"prompt": "Facts about tea", "provider": "gemini"}},
            {"step_id": 1, "tool_name": "llm_generate", "description": "Summarize",
             "args": {"prompt": "Summarize: {step_0_output}"}, "depends_on": [0]}
        ]
    })
    .to_string();
    let h = harness(Some(reply)).await;

    let result = h
        .runner
        .run(&request("s2", "Summarize what is known about tea"))
        .await
        .unwrap();

    assert_eq!(h.planner_model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.response, "groq: Summarize: gemini: Facts about tea");
    assert_eq!(result.total_tokens, 300 + 20 + 20);
    assert_eq!(
        result.models_used,
        vec!["gemini-2.5-flash".to_string(), "openai/gpt-oss-120b".to_string()]
    );
    assert_eq!(result.provider, "gemini-2.5-flash, openai/gpt-oss-120b");

    let stored = h.runs.get_request(&result.request_id).await.unwrap();
    assert_eq!(stored.strategy, "agent_multi");
    assert_eq!(stored.intent, "moderate");

    let plan = h.runs.get_plan(&result.request_id).await.unwrap().unwrap();
    assert_eq!(plan.plan["complexity"], "moderate");
    assert_eq!(plan.plan["steps"].as_array().unwrap().len(), 2);

    let steps = h.runs.list_steps(&result.request_id).await.unwrap();
    assert_eq!(steps[1].input_prompt, "Summarize: gemini: Facts about tea");
}

#[tokio::test]
async fn planning_failure_falls_back_to_one_step() {
    let h = harness(None).await;

    let result = h
        .runner
        .run(&request("s3", "Explain how tides work"))
        .await
        .unwrap();

    assert_eq!(h.planner_model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.steps_executed.len(), 1);
    assert_eq!(result.response, "gemini: Explain how tides work");
    assert_eq!(result.plan["complexity"], "moderate");
    assert!(result.plan["metadata"]["fallback_reason"].is_string());
}

#[tokio::test]
async fn invalid_email_step_is_recorded_and_run_continues() {
    let reply = json!({
        "steps": [
            {"step_id": 0, "tool_name": SEND_EMAIL, "description": "Send",
             "args": {"to_email": "nobody", "subject": "Hi", "body": "Hello"}},
            {"step_id": 1, "tool_name": "llm_generate", "description": "Report",
             "args": {"prompt": "Report on: {step_0_output}"}}
        ]
    })
    .to_string();
    let h = harness(Some(reply)).await;

    let result = h
        .runner
        .run(&request("s4", "Write an email to my team and report back"))
        .await
        .unwrap();

    assert!(!result.steps_executed[0].success);
    assert!(result.steps_executed[0].output.starts_with("[ERROR] InvalidArgument"));
    assert!(result.steps_executed[1].success);
    assert!(result.response.starts_with("groq: Report on: [ERROR] InvalidArgument"));
}

#[tokio::test]
async fn second_request_sees_session_context() {
    let h = harness(None).await;

    h.runner
        .run(&request("s5", "What is the capital of France?"))
        .await
        .unwrap();
    let plan = h.runner.plan_only("s5", "And of Spain?").await;
    assert_eq!(plan.steps.len(), 1);

    let context = h.memory.session_context("s5", 10, 3000).await.unwrap();
    assert_eq!(
        context,
        "User: What is the capital of France?\nAI: groq: What is the capital of France?"
    );
}
