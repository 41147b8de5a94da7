//! Agent error types.
//!
//! Tool failures never surface here: the registry folds them into a failed
//! [`ToolResult`](crate::tool::ToolResult). [`AgentError`] covers provider
//! calls, configuration, planning internals and the one fatal persistence
//! path (creating the request record).

/// Unified error type for the agent crate.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to an LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The provider response could not be parsed.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// A provider was used without an API key.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Registry errors -----------------------------------------------------
    /// A tool with this name is already registered.
    #[error("tool already registered: {name}")]
    DuplicateTool { name: String },

    // -- Delivery errors -----------------------------------------------------
    /// The email provider rejected or failed to accept a message.
    #[error("email delivery failed: {reason}")]
    EmailDeliveryFailed { reason: String },

    // -- Planner errors ------------------------------------------------------
    /// The planning response could not be turned into a usable plan.
    #[error("planning failed: {reason}")]
    PlanningFailed { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration loading or validation failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the store crate.
    #[error("store error: {0}")]
    Store(#[from] minimal_store::StoreError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
