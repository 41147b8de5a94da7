//! Startup helpers: tracing, prompt checks and the composition root.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use minimal_agent::config::AgentSettings;
use minimal_agent::{
    AgentRunner, ChatCompletionsClient, ChatCompletionsConfig, EmailSender, EmailTool,
    GenerateTool, ImageAnalysisTool, Planner, ResendMailer, StoreMemory, TextGenerator,
    ToolRegistry, VisionModel,
};
use minimal_store::{Database, MemoryStore, RunStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Longest prompt accepted from the command line.
pub const MAX_PROMPT_CHARS: usize = 5_000;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Join positional words into one prompt and check its length.
pub fn prompt_from_words(words: &[String]) -> Result<String> {
    let prompt = words.join(" ").trim().to_owned();
    if prompt.is_empty() {
        bail!("prompt is empty");
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        bail!("prompt is {chars} characters, the limit is {MAX_PROMPT_CHARS}");
    }
    Ok(prompt)
}

// ---------------------------------------------------------------------------
// Composition root
// ---------------------------------------------------------------------------

/// Everything a command needs, built once per process.
pub struct App {
    pub runner: AgentRunner,
    pub runs: RunStore,
    pub memory: MemoryStore,
}

/// Provider client for `api_key`, or `None` with a warning when the key is
/// not set.
fn provider_client(config: ChatCompletionsConfig) -> Result<Option<Arc<ChatCompletionsClient>>> {
    if config.api_key.trim().is_empty() {
        warn!(provider = %config.provider, "no API key configured, provider disabled");
        return Ok(None);
    }
    let provider = config.provider;
    let client = ChatCompletionsClient::new(config)
        .with_context(|| format!("failed to build {provider} client"))?;
    Ok(Some(Arc::new(client)))
}

pub async fn build_app(settings: &AgentSettings) -> Result<App> {
    let db = Database::open_and_migrate(settings.store.path.clone())
        .await
        .with_context(|| format!("failed to open database {}", settings.store.path.display()))?;
    info!(path = %settings.store.path.display(), "store initialized");

    let providers = &settings.providers;
    let timeout = providers.request_timeout();
    let groq = provider_client(
        ChatCompletionsConfig::groq(providers.groq_api_key.clone())
            .with_base_url(providers.groq_base_url.clone())
            .with_timeout(timeout),
    )?;
    let gemini = provider_client(
        ChatCompletionsConfig::gemini(providers.gemini_api_key.clone())
            .with_base_url(providers.gemini_base_url.clone())
            .with_timeout(timeout),
    )?;

    let mailer: Option<Arc<dyn EmailSender>> = if settings.email.resend_api_key.trim().is_empty() {
        warn!("no Resend API key configured, email delivery disabled");
        None
    } else {
        let mailer = ResendMailer::new(
            settings.email.resend_api_key.clone(),
            settings.email.from_address.clone(),
        )
        .context("failed to build email sender")?;
        Some(Arc::new(mailer))
    };

    let groq_text = groq.clone().map(|c| c as Arc<dyn TextGenerator>);
    let gemini_text = gemini.clone().map(|c| c as Arc<dyn TextGenerator>);
    let gemini_vision = gemini.map(|c| c as Arc<dyn VisionModel>);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GenerateTool::new(groq_text, gemini_text.clone())))?;
    registry.register(Arc::new(ImageAnalysisTool::new(
        gemini_vision,
        gemini_text.clone(),
    )))?;
    registry.register(Arc::new(EmailTool::new(mailer)))?;
    info!(tools = ?registry.names(), "tool registry ready");

    let planner = Planner::new(gemini_text, settings.planner_config());

    let runs = RunStore::new(db.clone());
    let memory = MemoryStore::new(db);
    let session_memory = StoreMemory::new(memory.clone()).with_window(
        settings.memory.context_exchanges,
        settings.memory.context_max_chars,
    );

    let runner = AgentRunner::new(
        Arc::new(registry),
        Arc::new(planner),
        Arc::new(session_memory),
        Arc::new(runs.clone()),
        settings.runner_config(),
    );

    Ok(App {
        runner,
        runs,
        memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn prompt_words_are_joined() {
        assert_eq!(
            prompt_from_words(&words("What is  the capital")).unwrap(),
            "What is the capital"
        );
    }

    #[test]
    fn empty_and_oversized_prompts_are_rejected() {
        assert!(prompt_from_words(&[]).is_err());
        assert!(prompt_from_words(&["   ".to_string()]).is_err());

        let long = vec!["x".repeat(MAX_PROMPT_CHARS + 1)];
        let err = prompt_from_words(&long).unwrap_err();
        assert!(err.to_string().contains("limit is 5000"));

        let exact = vec!["x".repeat(MAX_PROMPT_CHARS)];
        assert!(prompt_from_words(&exact).is_ok());
    }

    #[tokio::test]
    async fn app_builds_without_any_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AgentSettings::default();
        settings.store.path = dir.path().join("nested").join("minimal.db");

        let app = build_app(&settings).await.unwrap();
        let names = app.runner.registry().names();
        assert_eq!(names, vec!["llm_generate", "llm_analyze_image", "send_email"]);
        assert!(settings.store.path.exists());
    }
}
