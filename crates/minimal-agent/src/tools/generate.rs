//! `llm_generate`: general-purpose text generation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{GenerationRequest, Provider, TextGenerator};
use crate::tool::{
    ParamType, Tool, ToolArgs, ToolCategory, ToolError, ToolOutput, ToolParameter, ToolResult,
    ToolSpec,
};

pub const LLM_GENERATE: &str = "llm_generate";

const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Text generation on Groq or Gemini, chosen per call by the `provider`
/// argument.
pub struct GenerateTool {
    spec: ToolSpec,
    groq: Option<Arc<dyn TextGenerator>>,
    gemini: Option<Arc<dyn TextGenerator>>,
}

impl GenerateTool {
    pub fn new(
        groq: Option<Arc<dyn TextGenerator>>,
        gemini: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let spec = ToolSpec::new(
            LLM_GENERATE,
            "Generate text using an LLM. Use for answering questions, writing, analysis, \
             coding, reasoning, summarization, and any general-purpose text generation task.",
            ToolCategory::Llm,
        )
        .param(ToolParameter::required(
            "prompt",
            ParamType::String,
            "The prompt or instruction to send to the LLM",
        ))
        .param(
            ToolParameter::optional(
                "provider",
                ParamType::String,
                "Which LLM provider to use. 'groq' for fast simple tasks, 'gemini' for complex reasoning/coding.",
            )
            .with_default("groq")
            .with_enum(["groq", "gemini"]),
        )
        .param(ToolParameter::optional(
            "model",
            ParamType::String,
            "Specific model override (optional). Leave empty to use provider default.",
        ))
        .param(
            ToolParameter::optional(
                "temperature",
                ParamType::Number,
                "Sampling temperature 0.0-1.0. Lower = more focused, higher = more creative.",
            )
            .with_default(DEFAULT_TEMPERATURE),
        );

        Self { spec, groq, gemini }
    }

    fn generator(&self, provider: Provider) -> Option<&Arc<dyn TextGenerator>> {
        match provider {
            Provider::Groq => self.groq.as_ref(),
            Provider::Gemini => self.gemini.as_ref(),
        }
    }
}

#[async_trait]
impl Tool for GenerateTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let prompt = args.require_text("prompt")?;
        let provider = args
            .text("provider")
            .and_then(Provider::from_name)
            .unwrap_or(Provider::Groq);
        let model = args
            .text("model")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(provider.default_model());
        let temperature = args.number("temperature").unwrap_or(DEFAULT_TEMPERATURE);

        let Some(generator) = self.generator(provider) else {
            return Ok(ToolResult::failure(format!(
                "LLM generation failed: {provider} is not configured"
            ))
            .with_meta("provider", provider.as_str())
            .into());
        };

        let request = GenerationRequest::new(prompt, model, temperature);
        match generator.generate(&request).await {
            Ok(generation) => Ok(ToolResult::ok(generation.text)
                .with_tokens(generation.tokens_used)
                .with_meta("model", generation.model)
                .with_meta("provider", provider.as_str())
                .into()),
            Err(e) => Ok(ToolResult::failure(format!("LLM generation failed: {e}"))
                .with_meta("provider", provider.as_str())
                .into()),
        }
    }
}
