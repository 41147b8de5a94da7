//! OpenAI-compatible chat completions client.
//!
//! Groq and Gemini both serve `POST {base_url}/chat/completions` with a
//! Bearer key, so one non-streaming client covers text generation and
//! image understanding for either provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use super::types::{Generation, GenerationRequest, ImageRequest, Provider, estimate_tokens};
use super::{TextGenerator, VisionModel};
use crate::error::{AgentError, Result};

/// Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Gemini's OpenAI-compatible endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for one provider.
#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ChatCompletionsConfig {
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Groq,
            api_key: api_key.into(),
            base_url: GROQ_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Non-streaming chat completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    config: ChatCompletionsConfig,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Build a client. Fails when the API key is empty.
    pub fn new(config: ChatCompletionsConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.as_str().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    fn model_or_default<'a>(&self, model: &'a str) -> &'a str {
        if model.is_empty() {
            self.config.provider.default_model()
        } else {
            model
        }
    }

    /// Send one chat request and return the completion text plus the
    /// provider-reported token usage, if any.
    async fn complete(&self, body: &Value) -> Result<(String, Option<u64>)> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(|e| {
                AgentError::LlmRequestFailed {
                    reason: format!("invalid authorization header: {e}"),
                }
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = %self.config.provider,
            "sending LLM request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("{} API error: {e}", self.config.provider),
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("{} API returned {status}: {text}", self.config.provider),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        parse_completion(&v)
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn provider(&self) -> Provider {
        self.config.provider
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let model = self.model_or_default(&request.model).to_owned();
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.temperature,
        });
        if let Some(max) = request.max_tokens {
            body["max_tokens"] = json!(max);
        }

        let start = Instant::now();
        let (text, usage) = self.complete(&body).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(Generation {
            tokens_used: usage.unwrap_or_else(|| estimate_tokens(&request.prompt, &text)),
            text,
            latency_ms,
            model,
        })
    }
}

#[async_trait]
impl VisionModel for ChatCompletionsClient {
    async fn understand_image(&self, request: &ImageRequest) -> Result<Generation> {
        let model = self.model_or_default(&request.model).to_owned();
        let data_url = format!(
            "data:{};base64,{}",
            request.mime_type,
            BASE64.encode(&request.image)
        );
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": request.prompt},
                    {"type": "image_url", "image_url": {"url": data_url}},
                ],
            }],
            "temperature": request.temperature,
        });

        let start = Instant::now();
        let (text, usage) = self.complete(&body).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(Generation {
            tokens_used: usage.unwrap_or_else(|| estimate_tokens(&request.prompt, &text)),
            text,
            latency_ms,
            model,
        })
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract `choices[0].message.content` and `usage.total_tokens`.
///
/// Content may be a plain string or an array of `{ "text": ... }` parts.
pub fn parse_completion(v: &Value) -> Result<(String, Option<u64>)> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    let text = match &message["content"] {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
        _ => {
            return Err(AgentError::LlmParseFailed {
                reason: "response message has no text content".into(),
            });
        }
    };

    Ok((text, v["usage"]["total_tokens"].as_u64()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
