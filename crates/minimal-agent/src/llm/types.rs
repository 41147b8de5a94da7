//! Provider-neutral request and response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default Groq model: fast answers to simple prompts.
pub const GROQ_DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
/// Default Gemini model: planning and heavier reasoning.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Gemini model used for image understanding.
pub const GEMINI_VISION_MODEL: &str = "gemini-3-flash-preview";

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Gemini,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Gemini => "gemini",
        }
    }

    /// Parse a provider name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Groq => GROQ_DEFAULT_MODEL,
            Self::Gemini => GEMINI_DEFAULT_MODEL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-turn text generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Model identifier; empty selects the client's default.
    pub model: String,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }
}

/// An image understanding request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub image: Vec<u8>,
    pub mime_type: String,
    pub model: String,
    pub temperature: f64,
}

/// Text produced by a provider, with usage telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub model: String,
}

/// Rough token estimate used when a provider reports no usage: one token
/// per four characters of prompt plus response.
pub fn estimate_tokens(prompt: &str, response: &str) -> u64 {
    ((prompt.chars().count() + response.chars().count()) / 4) as u64
}
