//! Agent orchestration engine for minimal.
//!
//! A request flows through three parts: the [`Planner`] turns a prompt into
//! an [`ExecutionPlan`], the [`AgentRunner`] executes its steps in order,
//! and every step is dispatched by name through the [`ToolRegistry`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Planner    │────>│ AgentRunner  │────>│ ToolRegistry │
//! │ (classify +  │     │ (templates,  │     │ (llm, vision,│
//! │  LLM plan)   │     │  retry once) │     │  email)      │
//! └──────┬───────┘     └──────┬───────┘     └──────────────┘
//!        │                    │
//!  ┌─────┴──────┐    ┌────────┴────────┐
//!  │ LLM client │    │ SessionMemory / │
//!  │ (Groq,     │    │ RunRecorder     │
//!  │  Gemini)   │    │ (minimal-store) │
//!  └────────────┘    └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`tool`] -- Tool trait, typed arguments, schemas and the registry.
//! - [`tools`] -- Built-in tools: generation, image analysis, email.
//! - [`llm`] -- Provider traits and the chat completions client.
//! - [`complexity`] -- Keyword and length heuristic shared by planner and strategy.
//! - [`strategy`] -- Provider and model selection per complexity.
//! - [`planner`] -- Plan types, planning prompt, parsing and fallback.
//! - [`template`] -- `{step_N_output}` parsing and resolution.
//! - [`runner`] -- The execution loop.
//! - [`memory`] / [`recorder`] -- Persistence seams used by the runner.
//! - [`config`] -- TOML settings with environment overrides.
//! - [`error`] -- Agent error types.

pub mod complexity;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod planner;
pub mod recorder;
pub mod runner;
pub mod strategy;
pub mod template;
pub mod tool;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use complexity::{TaskComplexity, classify_complexity};
pub use config::AgentSettings;
pub use error::{AgentError, Result};
pub use llm::{
    ChatCompletionsClient, ChatCompletionsConfig, Generation, GenerationRequest, ImageRequest,
    Provider, TextGenerator, VisionModel,
};
pub use memory::{SessionMemory, StoreMemory};
pub use planner::{ExecutionPlan, PlanMetadata, PlanStep, Planner, PlannerConfig};
pub use recorder::RunRecorder;
pub use runner::{AgentRequest, AgentResult, AgentRunner, RunnerConfig, StepSummary};
pub use strategy::{ExecutionStrategy, StrategySelection, select_strategy};
pub use tool::{
    ArgValue, ParamType, Tool, ToolArgs, ToolCategory, ToolError, ToolOutput, ToolParameter,
    ToolRegistry, ToolResult, ToolSchema, ToolSpec,
};
pub use tools::{EmailSender, EmailTool, GenerateTool, ImageAnalysisTool, ResendMailer};
