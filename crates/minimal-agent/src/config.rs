//! File and environment configuration.
//!
//! Settings come from a TOML file whose sections all default, so a missing
//! file or a partial one is fine. Environment variables are applied on top
//! with [`AgentSettings::apply_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::llm::GEMINI_DEFAULT_MODEL;
use crate::llm::client::{GEMINI_BASE_URL, GROQ_BASE_URL};
use crate::planner::PlannerConfig;
use crate::runner::RunnerConfig;
use crate::tools::email::DEFAULT_FROM_EMAIL;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/minimal.toml";
/// Default location of the SQLite database.
pub const DEFAULT_DB_PATH: &str = "data/minimal.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub agent: AgentSection,
    pub planner: PlannerSection,
    pub memory: MemorySection,
    pub providers: ProvidersSection,
    pub email: EmailSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: usize,
    pub retry_on_failure: bool,
    pub cost_per_million_tokens: f64,
    pub stored_output_chars: usize,
    pub summary_output_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            max_steps: runner.max_steps,
            retry_on_failure: runner.retry_on_failure,
            cost_per_million_tokens: runner.cost_per_million_tokens,
            stored_output_chars: runner.stored_output_chars,
            summary_output_chars: runner.summary_output_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    pub model: String,
    pub temperature: f64,
    pub simple_temperature: f64,
    pub fallback_model: String,
    pub fallback_temperature: f64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        let planner = PlannerConfig::default();
        Self {
            model: planner.model,
            temperature: planner.temperature,
            simple_temperature: planner.simple_temperature,
            fallback_model: planner.fallback_model,
            fallback_temperature: planner.fallback_temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub context_exchanges: usize,
    pub context_max_chars: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            context_exchanges: crate::memory::DEFAULT_CONTEXT_EXCHANGES,
            context_max_chars: crate::memory::DEFAULT_CONTEXT_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub groq_api_key: String,
    pub gemini_api_key: String,
    pub groq_base_url: String,
    pub gemini_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            groq_api_key: String::new(),
            gemini_api_key: String::new(),
            groq_base_url: GROQ_BASE_URL.into(),
            gemini_base_url: GEMINI_BASE_URL.into(),
            request_timeout_secs: 120,
        }
    }
}

impl ProvidersSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    pub resend_api_key: String,
    pub from_address: String,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            from_address: DEFAULT_FROM_EMAIL.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl AgentSettings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let settings = Self::from_toml(&content)?;
        info!(path = %path.display(), "config loaded");
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to parse TOML config: {e}"),
        })?;
        if settings.agent.max_steps == 0 {
            return Err(AgentError::ConfigError {
                reason: "agent.max_steps must be at least 1".into(),
            });
        }
        Ok(settings)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Empty values are ignored; numeric and
    /// boolean values that fail to parse are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GROQ_API_KEY") {
            self.providers.groq_api_key = v;
        }
        if let Some(v) = get("GOOGLE_API_KEY") {
            self.providers.gemini_api_key = v;
        }
        if let Some(v) = get("RESEND_API_KEY") {
            self.email.resend_api_key = v;
        }
        if let Some(v) = get("RESEND_FROM_EMAIL") {
            self.email.from_address = v;
        }
        if let Some(v) = get("MINIMAL_DB_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = get("MINIMAL_AGENT_MAX_STEPS") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.agent.max_steps = n,
                _ => warn!(value = %v, "ignoring invalid MINIMAL_AGENT_MAX_STEPS"),
            }
        }
        if let Some(v) = get("MINIMAL_AGENT_RETRY_ON_FAILURE") {
            match parse_bool(&v) {
                Some(b) => self.agent.retry_on_failure = b,
                None => warn!(value = %v, "ignoring invalid MINIMAL_AGENT_RETRY_ON_FAILURE"),
            }
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_steps: self.agent.max_steps.max(1),
            retry_on_failure: self.agent.retry_on_failure,
            stored_output_chars: self.agent.stored_output_chars,
            summary_output_chars: self.agent.summary_output_chars,
            cost_per_million_tokens: self.agent.cost_per_million_tokens,
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        let model = if self.planner.model.trim().is_empty() {
            GEMINI_DEFAULT_MODEL.to_owned()
        } else {
            self.planner.model.clone()
        };
        PlannerConfig {
            model,
            temperature: self.planner.temperature,
            simple_temperature: self.planner.simple_temperature,
            fallback_model: self.planner.fallback_model.clone(),
            fallback_temperature: self.planner.fallback_temperature,
            ..PlannerConfig::default()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
