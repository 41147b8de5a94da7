//! Agent runner.
//!
//! Drives one request end to end: session context, plan, sequential step
//! execution with a single immediate retry, response compilation and
//! best-effort persistence. Steps always run in list order; `depends_on` is
//! carried in the plan but never used for scheduling.
//!
//! A failed step does not abort the run. Its recorded output becomes an
//! `[ERROR] ...` marker that later steps may receive through
//! `{step_N_output}` references.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use minimal_store::{NewInteraction, NewRequest, NewResponse, NewStep, PlanSummary, truncate_chars};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::memory::SessionMemory;
use crate::planner::{ExecutionPlan, Planner};
use crate::recorder::RunRecorder;
use crate::template;
use crate::tool::{ToolArgs, ToolRegistry, ToolResult};

/// Prefix of the output recorded for a failed step.
pub const ERROR_MARKER: &str = "[ERROR]";
/// Response when the plan produced no outputs at all.
pub const NO_RESPONSE_MESSAGE: &str = "I couldn't generate a response. Please try again.";
/// Response when every step failed.
pub const ALL_FAILED_MESSAGE: &str =
    "An error occurred while processing your request. Please try again.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runner policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Steps beyond this count are dropped before execution.
    pub max_steps: usize,
    /// Re-execute a failed step once, immediately.
    pub retry_on_failure: bool,
    /// Cap on the output text persisted per step.
    pub stored_output_chars: usize,
    /// Cap on the output text returned in [`StepSummary`].
    pub summary_output_chars: usize,
    pub cost_per_million_tokens: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            retry_on_failure: true,
            stored_output_chars: 10_000,
            summary_output_chars: 2_000,
            cost_per_million_tokens: 0.10,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub session_id: String,
    pub user_id: String,
    pub prompt: String,
}

/// What happened in one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_id: u32,
    pub tool_name: String,
    pub description: String,
    pub success: bool,
    /// Recorded output, capped at `summary_output_chars`.
    pub output: String,
    pub error: Option<String>,
    pub latency_ms: u64,
    pub tokens_used: u64,
    pub model: String,
}

/// Outcome of [`AgentRunner::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub request_id: String,
    pub response: String,
    pub plan: Value,
    pub steps_executed: Vec<StepSummary>,
    /// Planning tokens plus every step's tokens.
    pub total_tokens: u64,
    pub latency_ms: u64,
    /// Distinct model identifiers, sorted.
    pub models_used: Vec<String>,
    /// `models_used` joined by `", "`.
    pub provider: String,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Executes plans against a shared tool registry.
///
/// The registry and planner are read-only here, so one runner can serve
/// concurrent requests; each call to [`run`](Self::run) owns its own
/// step-output map.
pub struct AgentRunner {
    registry: Arc<ToolRegistry>,
    planner: Arc<Planner>,
    memory: Arc<dyn SessionMemory>,
    recorder: Arc<dyn RunRecorder>,
    config: RunnerConfig,
}

impl AgentRunner {
    pub fn new(
        registry: Arc<ToolRegistry>,
        planner: Arc<Planner>,
        memory: Arc<dyn SessionMemory>,
        recorder: Arc<dyn RunRecorder>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            registry,
            planner,
            memory,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Context lookup plus planning plus the step cap, without executing.
    pub async fn plan_only(&self, session_id: &str, prompt: &str) -> ExecutionPlan {
        let context = self.context_for(session_id).await;
        let mut plan = self
            .planner
            .create_plan(prompt, &self.registry.list_schemas(), &context)
            .await;

        let max_steps = self.config.max_steps.max(1);
        let dropped = plan.truncate(max_steps);
        if dropped > 0 {
            tracing::warn!(
                max_steps,
                dropped,
                "plan capped to maximum step count"
            );
        }
        plan
    }

    /// Process one request.
    ///
    /// Only a failure to create the request record is returned as an error.
    /// Tool failures end up in the step outputs; every other persistence
    /// failure is logged and skipped.
    pub async fn run(&self, request: &AgentRequest) -> Result<AgentResult> {
        let start = Instant::now();

        let plan = self.plan_only(&request.session_id, &request.prompt).await;
        tracing::info!(
            step_count = plan.steps.len(),
            complexity = %plan.complexity,
            reasoning = %plan.reasoning,
            "plan ready"
        );
        let plan_value = plan.to_value();

        let strategy = if plan.steps.len() == 1 {
            "agent_single"
        } else {
            "agent_multi"
        };
        let request_id = self
            .recorder
            .create_request(NewRequest {
                session_id: request.session_id.clone(),
                user_prompt: request.prompt.clone(),
                intent: plan.complexity.as_str().to_owned(),
                strategy: strategy.to_owned(),
            })
            .await?;

        if let Err(e) = self.recorder.store_plan(&request_id, &plan_value).await {
            tracing::warn!(%request_id, error = %e, "failed to store plan");
        }

        let mut outputs: BTreeMap<u32, String> = BTreeMap::new();
        let mut summaries = Vec::with_capacity(plan.steps.len());
        let mut total_tokens = plan.metadata.planning_tokens;
        let mut models = BTreeSet::new();

        for step in &plan.steps {
            tracing::info!(
                %request_id,
                step_id = step.step_id,
                tool = %step.tool_name,
                description = %step.description,
                "executing step"
            );

            let resolved = template::resolve_args(&step.args, &outputs);
            let args = ToolArgs::from_json(&resolved);
            let result = self.execute_with_retry(&step.tool_name, &args).await;

            let output = step_output(&result);
            let model = result.model().unwrap_or(&step.tool_name).to_owned();
            total_tokens += result.tokens_used;
            models.insert(model.clone());

            let step_record = NewStep {
                request_id: request_id.clone(),
                step_type: format!("agent_tool:{}", step.tool_name),
                model_name: model.clone(),
                input_prompt: truncate_chars(
                    &step_input(&resolved),
                    self.config.stored_output_chars,
                ),
                output_text: truncate_chars(&output, self.config.stored_output_chars),
                tokens_used: result.tokens_used,
                latency_ms: result.latency_ms,
            };
            if let Err(e) = self.recorder.create_step(step_record).await {
                tracing::warn!(%request_id, step_id = step.step_id, error = %e, "failed to store step");
            }

            tracing::info!(
                step_id = step.step_id,
                success = result.success,
                latency_ms = result.latency_ms,
                tokens = result.tokens_used,
                "step finished"
            );

            summaries.push(StepSummary {
                step_id: step.step_id,
                tool_name: step.tool_name.clone(),
                description: step.description.clone(),
                success: result.success,
                output: truncate_chars(&output, self.config.summary_output_chars),
                error: result.error.clone(),
                latency_ms: result.latency_ms,
                tokens_used: result.tokens_used,
                model,
            });
            outputs.insert(step.step_id, output);
        }

        let response = compile_response(&outputs);
        let latency_ms = start.elapsed().as_millis() as u64;
        let models_used: Vec<String> = models.into_iter().collect();

        let response_record = NewResponse {
            request_id: request_id.clone(),
            final_response: response.clone(),
            models_used: json!({
                "models": models_used,
                "strategy": "agent",
                "plan": plan_value,
            }),
            latency_ms,
            estimated_cost: estimate_cost(total_tokens, self.config.cost_per_million_tokens),
        };
        if let Err(e) = self.recorder.create_response(response_record).await {
            tracing::warn!(%request_id, error = %e, "failed to store response");
        }

        let interaction = NewInteraction {
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
            prompt: request.prompt.clone(),
            response: response.clone(),
            plan_summary: Some(PlanSummary {
                complexity: plan.complexity.as_str().to_owned(),
                steps_count: plan.steps.len(),
            }),
        };
        if let Err(e) = self.memory.store_interaction(interaction).await {
            tracing::warn!(session_id = %request.session_id, error = %e, "failed to store interaction");
        }

        tracing::info!(
            %request_id,
            latency_ms,
            total_tokens,
            steps = summaries.len(),
            "agent run complete"
        );

        Ok(AgentResult {
            request_id,
            response,
            plan: plan_value,
            steps_executed: summaries,
            total_tokens,
            latency_ms,
            provider: models_used.join(", "),
            models_used,
        })
    }

    /// Execute a tool, and once more with the same arguments if the first
    /// attempt failed and retry is enabled. The last result is returned.
    pub async fn execute_with_retry(&self, tool_name: &str, args: &ToolArgs) -> ToolResult {
        let result = self.registry.execute(tool_name, args).await;
        if result.success || !self.config.retry_on_failure {
            return result;
        }

        tracing::warn!(
            tool = %tool_name,
            error = result.error.as_deref().unwrap_or_default(),
            "step failed, retrying once"
        );
        self.registry.execute(tool_name, args).await
    }

    async fn context_for(&self, session_id: &str) -> String {
        match self.memory.session_context(session_id).await {
            Ok(context) => {
                tracing::debug!(chars = context.chars().count(), "session context loaded");
                context
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "failed to load session context");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Text recorded for a step: the output on success, an error marker on
/// failure.
fn step_output(result: &ToolResult) -> String {
    if result.success {
        result.output_text()
    } else {
        format!(
            "{ERROR_MARKER} {}",
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// The resolved `prompt` argument when there is one, else all arguments as
/// JSON.
fn step_input(resolved: &Value) -> String {
    match resolved.get("prompt") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => resolved.to_string(),
    }
}

/// Pick the final response from the recorded step outputs.
///
/// The output of the highest step id wins unless it is an error marker, in
/// which case the highest-numbered non-error output is used.
pub fn compile_response(outputs: &BTreeMap<u32, String>) -> String {
    let Some((_, last)) = outputs.last_key_value() else {
        return NO_RESPONSE_MESSAGE.to_owned();
    };
    if !last.starts_with(ERROR_MARKER) {
        return last.clone();
    }

    outputs
        .values()
        .rev()
        .find(|o| !o.starts_with(ERROR_MARKER))
        .cloned()
        .unwrap_or_else(|| ALL_FAILED_MESSAGE.to_owned())
}

/// Advisory cost: `tokens / 1e6 * rate`.
pub fn estimate_cost(total_tokens: u64, cost_per_million_tokens: f64) -> f64 {
    total_tokens as f64 / 1_000_000.0 * cost_per_million_tokens
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
