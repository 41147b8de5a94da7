//! LLM provider access.
//!
//! The rest of the crate only sees the [`TextGenerator`] and
//! [`VisionModel`] traits; [`ChatCompletionsClient`] implements both over
//! the OpenAI-compatible chat completions endpoint that Groq and Gemini
//! expose.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::{ChatCompletionsClient, ChatCompletionsConfig};
pub use types::{
    GEMINI_DEFAULT_MODEL, GEMINI_VISION_MODEL, GROQ_DEFAULT_MODEL, Generation, GenerationRequest,
    ImageRequest, Provider, estimate_tokens,
};

use crate::error::Result;

/// Single-turn text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Image understanding.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn understand_image(&self, request: &ImageRequest) -> Result<Generation>;
}
