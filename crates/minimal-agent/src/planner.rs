//! Task planner.
//!
//! Turns a prompt into an [`ExecutionPlan`]. Simple prompts get a
//! single generation step without any model call. Everything else is sent
//! to a planning model together with the tool schemas and recent session
//! context; if that call or its parsing fails, a single-step fallback plan
//! is returned instead. [`Planner::create_plan`] therefore always yields a
//! plan with at least one step.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::complexity::{TaskComplexity, classify_complexity};
use crate::error::{AgentError, Result};
use crate::llm::{GEMINI_DEFAULT_MODEL, GenerationRequest, Provider, TextGenerator};
use crate::tool::ToolSchema;
use crate::tools::LLM_GENERATE;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// One planned tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Handle used by `{step_N_output}` references. Unique within a plan.
    pub step_id: u32,
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    /// Argument object; string leaves may contain step references.
    #[serde(default)]
    pub args: Value,
    /// Informational only. Steps always run in list order.
    #[serde(default)]
    pub depends_on: Vec<u32>,
}

/// Cost of producing the plan itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub planning_tokens: u64,
    #[serde(default)]
    pub planning_latency_ms: u64,
    /// Why the fallback plan was used, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Ordered steps for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub goal: String,
    pub complexity: TaskComplexity,
    pub reasoning: String,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub metadata: PlanMetadata,
}

impl ExecutionPlan {
    /// Drop steps beyond `max_steps`. Returns how many were dropped.
    pub fn truncate(&mut self, max_steps: usize) -> usize {
        let dropped = self.steps.len().saturating_sub(max_steps);
        self.steps.truncate(max_steps);
        dropped
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.fallback_reason.is_some()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Planner settings.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Model used for the planning call.
    pub model: String,
    pub temperature: f64,
    /// Provider and temperature of the single step built for simple prompts.
    pub simple_provider: Provider,
    pub simple_temperature: f64,
    /// Provider, model and temperature of the fallback step.
    pub fallback_provider: Provider,
    pub fallback_model: String,
    pub fallback_temperature: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: GEMINI_DEFAULT_MODEL.into(),
            temperature: 0.3,
            simple_provider: Provider::Groq,
            simple_temperature: 0.4,
            fallback_provider: Provider::Gemini,
            fallback_model: GEMINI_DEFAULT_MODEL.into(),
            fallback_temperature: 0.5,
        }
    }
}

/// Builds execution plans.
pub struct Planner {
    generator: Option<Arc<dyn TextGenerator>>,
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner. Without a generator every non-simple prompt gets
    /// the fallback plan.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, config: PlannerConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Produce a plan for `prompt`. Never fails.
    pub async fn create_plan(
        &self,
        prompt: &str,
        tools: &[ToolSchema],
        context: &str,
    ) -> ExecutionPlan {
        let complexity = classify_complexity(prompt);

        if complexity == TaskComplexity::Simple {
            tracing::debug!("simple prompt, skipping planning call");
            return self.simple_plan(prompt, complexity);
        }

        match self.plan_with_model(prompt, tools, context, complexity).await {
            Ok(plan) => {
                tracing::info!(
                    %complexity,
                    step_count = plan.steps.len(),
                    planning_tokens = plan.metadata.planning_tokens,
                    "plan generated"
                );
                plan
            }
            Err(e) => {
                tracing::warn!(%complexity, error = %e, "planning failed, using fallback plan");
                self.fallback_plan(prompt, complexity, &e.to_string())
            }
        }
    }

    async fn plan_with_model(
        &self,
        prompt: &str,
        tools: &[ToolSchema],
        context: &str,
        complexity: TaskComplexity,
    ) -> Result<ExecutionPlan> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| AgentError::PlanningFailed {
                reason: "no planning model configured".into(),
            })?;

        let request = GenerationRequest::new(
            build_planning_prompt(prompt, tools, context, complexity),
            self.config.model.clone(),
            self.config.temperature,
        );
        let generation = generator.generate(&request).await?;

        let mut plan = parse_plan(&generation.text, prompt, complexity)?;
        plan.metadata.planning_tokens = generation.tokens_used;
        plan.metadata.planning_latency_ms = generation.latency_ms;
        Ok(plan)
    }

    /// Single generation step on the fast provider.
    pub fn simple_plan(&self, prompt: &str, complexity: TaskComplexity) -> ExecutionPlan {
        ExecutionPlan {
            goal: prompt.to_owned(),
            complexity,
            reasoning: "Simple query: direct LLM response, no planning needed.".into(),
            steps: vec![PlanStep {
                step_id: 0,
                tool_name: LLM_GENERATE.into(),
                description: "Generate direct response".into(),
                args: json!({
                    "prompt": prompt,
                    "provider": self.config.simple_provider.as_str(),
                    "temperature": self.config.simple_temperature,
                }),
                depends_on: Vec::new(),
            }],
            metadata: PlanMetadata::default(),
        }
    }

    /// Single generation step on the capable provider, used whenever the
    /// planning call fails.
    pub fn fallback_plan(
        &self,
        prompt: &str,
        complexity: TaskComplexity,
        reason: &str,
    ) -> ExecutionPlan {
        ExecutionPlan {
            goal: prompt.to_owned(),
            complexity,
            reasoning: "AI planning failed, falling back to a direct LLM response.".into(),
            steps: vec![PlanStep {
                step_id: 0,
                tool_name: LLM_GENERATE.into(),
                description: "Generate direct response (fallback)".into(),
                args: json!({
                    "prompt": prompt,
                    "provider": self.config.fallback_provider.as_str(),
                    "model": self.config.fallback_model,
                    "temperature": self.config.fallback_temperature,
                }),
                depends_on: Vec::new(),
            }],
            metadata: PlanMetadata {
                fallback_reason: Some(reason.to_owned()),
                ..PlanMetadata::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt building
// ---------------------------------------------------------------------------

/// Numbered tool listing for the planning prompt.
pub fn format_tools(tools: &[ToolSchema]) -> String {
    let mut blocks = Vec::with_capacity(tools.len());
    for (i, tool) in tools.iter().enumerate() {
        let mut block = format!(
            "{}. **{}** [{}]\n   {}\n   Parameters:",
            i + 1,
            tool.name,
            tool.category,
            tool.description
        );
        if tool.parameters.is_empty() {
            block.push_str("\n    (no parameters)");
        }
        for p in &tool.parameters {
            let _ = write!(
                block,
                "\n    - {} ({}): {}",
                p.name,
                p.param_type.as_str(),
                p.description
            );
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}

/// Full planning prompt.
pub fn build_planning_prompt(
    prompt: &str,
    tools: &[ToolSchema],
    context: &str,
    complexity: TaskComplexity,
) -> String {
    let tool_list = format_tools(tools);
    let context_block = if context.trim().is_empty() {
        String::new()
    } else {
        format!("\nCONVERSATION CONTEXT (previous exchanges in this session):\n{context}\n")
    };

    format!(
        r#"You are the planning engine for an autonomous AI agent called minimal.ai.

Your job: analyze the user's request and create a structured execution plan using the available tools.

AVAILABLE TOOLS:
{tool_list}
{context_block}
USER REQUEST: "{prompt}"

RULES:
1. Break the task into 1-6 ordered steps using ONLY the available tools.
2. Each step must use exactly one tool by its exact name.
3. Use "llm_generate" for any text generation, analysis, or reasoning.
4. Use "llm_analyze_image" ONLY if the user explicitly provides an image.
5. Use "send_email" ONLY if the user explicitly asks to send an email.
6. A step can use the output of an earlier step: write {{step_N_output}} inside an argument string, where N is that step's step_id, and list N in depends_on.
7. For the "llm_generate" tool args, include "prompt" with the specific sub-task prompt.
8. Include "provider" in args: use "groq" for quick factual tasks, "gemini" for complex reasoning/coding.
9. Keep it minimal. Do not add unnecessary steps.

Respond ONLY with valid JSON (no markdown, no extra text):
{{
    "goal": "Brief description of the overall goal",
    "complexity": "{complexity}",
    "reasoning": "Why you chose this plan",
    "steps": [
        {{
            "step_id": 0,
            "tool_name": "tool_name_here",
            "description": "What this step does",
            "args": {{"key": "value"}},
            "depends_on": []
        }}
    ]
}}"#
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the model's reply as JSON: first as-is, then the span from the
/// first `{` to the last `}`.
pub fn parse_plan_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Ok(v);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
        && let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end])
    {
        return Ok(v);
    }

    let preview: String = trimmed.chars().take(200).collect();
    Err(AgentError::PlanningFailed {
        reason: format!("could not parse plan JSON from LLM response: {preview}"),
    })
}

/// Build a plan from the model's reply.
///
/// The returned plan carries the heuristic `complexity`, whatever the model
/// claimed. A reply without steps, with a step lacking `tool_name`, or with
/// repeated step ids is rejected. A missing `step_id` defaults to the
/// step's position.
pub fn parse_plan(text: &str, prompt: &str, complexity: TaskComplexity) -> Result<ExecutionPlan> {
    let v = parse_plan_json(text)?;

    let raw_steps = v["steps"]
        .as_array()
        .ok_or_else(|| AgentError::PlanningFailed {
            reason: "plan JSON missing `steps` array".into(),
        })?;

    if raw_steps.is_empty() {
        return Err(AgentError::PlanningFailed {
            reason: "plan contains zero steps".into(),
        });
    }

    let mut seen = HashSet::with_capacity(raw_steps.len());
    let mut steps = Vec::with_capacity(raw_steps.len());

    for (i, sv) in raw_steps.iter().enumerate() {
        let tool_name = sv["tool_name"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AgentError::PlanningFailed {
                reason: format!("step {i} has no `tool_name`"),
            })?;

        let step_id = sv["step_id"]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(i as u32);

        if !seen.insert(step_id) {
            return Err(AgentError::PlanningFailed {
                reason: format!("duplicate step_id {step_id}"),
            });
        }

        let args = match &sv["args"] {
            Value::Object(map) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };

        steps.push(PlanStep {
            step_id,
            tool_name: tool_name.trim().to_owned(),
            description: sv["description"].as_str().unwrap_or_default().to_owned(),
            args,
            depends_on: sv["depends_on"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|d| d.as_u64().and_then(|n| u32::try_from(n).ok()))
                        .collect()
                })
                .unwrap_or_default(),
        });
    }

    let goal = v["goal"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(prompt)
        .to_owned();

    Ok(ExecutionPlan {
        goal,
        complexity,
        reasoning: v["reasoning"].as_str().unwrap_or_default().to_owned(),
        steps,
        metadata: PlanMetadata::default(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::Generation;
    use crate::tool::{ParamType, ToolCategory, ToolParameter, ToolSpec};

    /// Replies with a fixed text, or fails when `reply` is `None`.
    struct ScriptedGenerator {
        reply: Option<String>,
        calls: AtomicU32,
        last_prompt: Mutex<String>,
    }

    impl ScriptedGenerator {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_owned),
                calls: AtomicU32::new(0),
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = request.prompt.clone();
            match &self.reply {
                Some(text) => Ok(Generation {
                    text: text.clone(),
                    tokens_used: 321,
                    latency_ms: 45,
                    model: request.model.clone(),
                }),
                None => Err(AgentError::LlmRequestFailed {
                    reason: "timeout".into(),
                }),
            }
        }
    }

    fn schemas() -> Vec<ToolSchema> {
        vec![
            ToolSpec::new("llm_generate", "Generate text", ToolCategory::Llm)
                .param(ToolParameter::required("prompt", ParamType::String, "The prompt"))
                .schema(),
            ToolSpec::new("ping", "No arguments", ToolCategory::System).schema(),
        ]
    }

    const TWO_STEP_PLAN: &str = r#"{
        "goal": "Research then summarize",
        "complexity": "simple",
        "reasoning": "Two passes",
        "steps": [
            {"step_id": 0, "tool_name": "llm_generate", "description": "Research",
             "args": {"prompt": "Research X", "provider": "gemini"}, "depends_on": []},
            {"step_id": 1, "tool_name": "llm_generate", "description": "Summarize",
             "args": {"prompt": "Summarize {step_0_output}"}, "depends_on": [0]}
        ]
    }"#;

    fn planner(generator: Option<Arc<ScriptedGenerator>>) -> Planner {
        Planner::new(
            generator.map(|g| g as Arc<dyn TextGenerator>),
            PlannerConfig::default(),
        )
    }

    #[tokio::test]
    async fn simple_prompt_skips_the_planning_call() {
        let generator = ScriptedGenerator::new(Some(TWO_STEP_PLAN));
        let plan = planner(Some(generator.clone()))
            .create_plan("What is the capital of France?", &schemas(), "")
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.complexity, TaskComplexity::Simple);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool_name, "llm_generate");
        assert_eq!(plan.steps[0].args["provider"], "groq");
        assert_eq!(plan.steps[0].args["temperature"], json!(0.4));
    }

    #[tokio::test]
    async fn complex_prompt_uses_the_model_plan() {
        let generator = ScriptedGenerator::new(Some(TWO_STEP_PLAN));
        let plan = planner(Some(generator.clone()))
            .create_plan("Analyze the market and summarize", &schemas(), "User: hi\nAI: hello")
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].depends_on, vec![0]);
        // The model said "simple"; the heuristic label wins.
        assert_eq!(plan.complexity, TaskComplexity::Complex);
        assert_eq!(plan.metadata.planning_tokens, 321);
        assert_eq!(plan.metadata.planning_latency_ms, 45);
        assert!(!plan.is_fallback());

        let sent = generator.last_prompt.lock().unwrap().clone();
        assert!(sent.contains("CONVERSATION CONTEXT"));
        assert!(sent.contains("User: hi\nAI: hello"));
        assert!(sent.contains(r#"USER REQUEST: "Analyze the market and summarize""#));
    }

    #[tokio::test]
    async fn provider_error_yields_fallback() {
        let generator = ScriptedGenerator::new(None);
        let plan = planner(Some(generator.clone()))
            .create_plan("Explain quantum tunnelling", &schemas(), "")
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(plan.complexity, TaskComplexity::Moderate);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].args["provider"], "gemini");
        assert_eq!(plan.steps[0].args["model"], "gemini-2.5-flash");
        assert_eq!(plan.steps[0].description, "Generate direct response (fallback)");
        assert!(plan.is_fallback());
    }

    #[tokio::test]
    async fn image_prompt_failure_keeps_image_complexity() {
        let generator = ScriptedGenerator::new(None);
        let plan = planner(Some(generator.clone()))
            .create_plan("Describe this image of a cat", &schemas(), "")
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(plan.complexity, TaskComplexity::Image);
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.is_fallback());
    }

    #[tokio::test]
    async fn unparseable_reply_yields_fallback() {
        let generator = ScriptedGenerator::new(Some("Sure! Here is my plan: do the thing."));
        let plan = planner(Some(generator))
            .create_plan("Design a database schema", &schemas(), "")
            .await;
        assert_eq!(plan.complexity, TaskComplexity::Complex);
        assert!(plan.is_fallback());
        assert!(!plan.steps.is_empty());
    }

    #[tokio::test]
    async fn missing_generator_yields_fallback() {
        let plan = planner(None)
            .create_plan("Summarize the news", &schemas(), "")
            .await;
        assert!(plan.is_fallback());
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn parse_json_direct_and_embedded() {
        assert_eq!(parse_plan_json(r#"{"a":1}"#).unwrap()["a"], 1);
        let wrapped = "```json\n{\"a\": {\"b\": 2}}\n```\nDone.";
        assert_eq!(parse_plan_json(wrapped).unwrap()["a"]["b"], 2);
        assert!(parse_plan_json("no json here").is_err());
        assert!(parse_plan_json("} backwards {").is_err());
    }

    #[test]
    fn empty_steps_are_rejected() {
        let err = parse_plan(r#"{"steps": []}"#, "p", TaskComplexity::Complex).unwrap_err();
        assert!(matches!(err, AgentError::PlanningFailed { .. }));
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let text = r#"{"steps": [
            {"step_id": 1, "tool_name": "llm_generate"},
            {"step_id": 1, "tool_name": "llm_generate"}
        ]}"#;
        assert!(parse_plan(text, "p", TaskComplexity::Complex).is_err());
    }

    #[test]
    fn missing_tool_name_is_rejected() {
        let text = r#"{"steps": [{"step_id": 0, "args": {}}]}"#;
        assert!(parse_plan(text, "p", TaskComplexity::Complex).is_err());
    }

    #[test]
    fn missing_fields_get_defaults() {
        let text = r#"{"steps": [{"tool_name": "llm_generate"}, {"tool_name": "ping", "args": "bad"}]}"#;
        let plan = parse_plan(text, "original prompt", TaskComplexity::Moderate).unwrap();
        assert_eq!(plan.goal, "original prompt");
        assert_eq!(plan.steps[0].step_id, 0);
        assert_eq!(plan.steps[1].step_id, 1);
        assert_eq!(plan.steps[1].args, json!({}));
        assert!(plan.steps[0].depends_on.is_empty());
    }

    #[test]
    fn tool_listing_format() {
        let listing = format_tools(&schemas());
        assert_eq!(
            listing,
            "1. **llm_generate** [llm]\n   Generate text\n   Parameters:\n    - prompt (string): The prompt\n\n\
             2. **ping** [system]\n   No arguments\n   Parameters:\n    (no parameters)"
        );
    }

    #[test]
    fn prompt_without_context_has_no_context_block() {
        let p = build_planning_prompt("Do it", &schemas(), "  ", TaskComplexity::Complex);
        assert!(!p.contains("CONVERSATION CONTEXT"));
        assert!(p.contains(r#""complexity": "complex""#));
        assert!(p.contains("{step_N_output}"));
    }

    #[test]
    fn truncate_reports_dropped_steps() {
        let step = |id| PlanStep {
            step_id: id,
            tool_name: "llm_generate".into(),
            description: String::new(),
            args: json!({}),
            depends_on: vec![],
        };
        let mut plan = ExecutionPlan {
            goal: "g".into(),
            complexity: TaskComplexity::Complex,
            reasoning: String::new(),
            steps: (0..15).map(step).collect(),
            metadata: PlanMetadata::default(),
        };
        assert_eq!(plan.truncate(10), 5);
        assert_eq!(plan.steps.len(), 10);
        assert_eq!(plan.truncate(10), 0);
    }
}
