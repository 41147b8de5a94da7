//! Top-level execution strategy selection.
//!
//! Maps the shared complexity classification to a provider, model and
//! temperature for callers that want a single routing decision without
//! running the planner.

use serde::{Deserialize, Serialize};

use crate::complexity::{TaskComplexity, classify_complexity};
use crate::llm::{GEMINI_DEFAULT_MODEL, GEMINI_VISION_MODEL, GROQ_DEFAULT_MODEL, Provider};

/// How a request should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    SingleStep,
    MultiStep,
    ImageUnderstanding,
}

/// A routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    pub complexity: TaskComplexity,
    pub strategy: ExecutionStrategy,
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
    pub description: String,
}

/// Choose a strategy for `prompt`.
pub fn select_strategy(prompt: &str) -> StrategySelection {
    let complexity = classify_complexity(prompt);
    let (strategy, provider, model, temperature, description) = match complexity {
        TaskComplexity::Image => (
            ExecutionStrategy::ImageUnderstanding,
            Provider::Gemini,
            GEMINI_VISION_MODEL,
            0.4,
            "Image understanding with the Gemini vision model",
        ),
        TaskComplexity::Complex => (
            ExecutionStrategy::MultiStep,
            Provider::Gemini,
            GEMINI_DEFAULT_MODEL,
            0.5,
            "Complex reasoning with Gemini",
        ),
        TaskComplexity::Moderate => (
            ExecutionStrategy::SingleStep,
            Provider::Gemini,
            GEMINI_DEFAULT_MODEL,
            0.7,
            "Moderate task with Gemini",
        ),
        TaskComplexity::Simple => (
            ExecutionStrategy::SingleStep,
            Provider::Groq,
            GROQ_DEFAULT_MODEL,
            0.4,
            "Quick response with Groq",
        ),
    };

    StrategySelection {
        complexity,
        strategy,
        provider,
        model: model.to_owned(),
        temperature,
        description: description.to_owned(),
    }
}
