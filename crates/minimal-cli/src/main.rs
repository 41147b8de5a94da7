//! CLI entry point for minimal.
//!
//! This binary provides the `minimal` command: run a prompt through the
//! agent, inspect a plan without executing it, list the registered tools,
//! and read back stored steps and session memory.

mod helpers;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use minimal_agent::AgentRequest;
use minimal_agent::config::{AgentSettings, DEFAULT_CONFIG_PATH};
use tracing::info;
use uuid::Uuid;

use crate::helpers::{build_app, init_tracing, prompt_from_words};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// minimal: plan and run multi-step tasks over LLM tools.
#[derive(Parser)]
#[command(
    name = "minimal",
    version,
    about = "Agent orchestration engine",
    long_about = "Classifies a prompt, plans it into tool steps and executes them in order, \
                  recording every request, step and response."
)]
struct Cli {
    /// Settings file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt through the agent.
    Run {
        /// Session to attach to. A new one is created when omitted.
        #[arg(long)]
        session: Option<String>,

        /// User recorded with the interaction.
        #[arg(long, default_value = "local")]
        user: String,

        /// Print the full result as JSON instead of just the response.
        #[arg(long)]
        json: bool,

        /// The prompt.
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// Print the plan for a prompt without executing it.
    Plan {
        /// Session whose memory is used as context.
        #[arg(long, default_value = "")]
        session: String,

        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// List registered tool schemas.
    Tools,

    /// Show stored steps for a request.
    Steps {
        request_id: String,
    },

    /// Show stored exchanges for a session.
    Memory {
        session_id: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("info");

    let mut settings = AgentSettings::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    settings.apply_env();

    match cli.command {
        Commands::Run {
            session,
            user,
            json,
            prompt,
        } => cmd_run(&settings, session, user, json, &prompt).await,
        Commands::Plan { session, prompt } => cmd_plan(&settings, &session, &prompt).await,
        Commands::Tools => cmd_tools(&settings).await,
        Commands::Steps { request_id } => cmd_steps(&settings, &request_id).await,
        Commands::Memory { session_id } => cmd_memory(&settings, &session_id).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_run(
    settings: &AgentSettings,
    session: Option<String>,
    user: String,
    json: bool,
    words: &[String],
) -> Result<()> {
    let prompt = prompt_from_words(words)?;
    let app = build_app(settings).await?;

    let session_id = session.unwrap_or_else(|| Uuid::now_v7().to_string());
    info!(%session_id, "running prompt");

    let result = app
        .runner
        .run(&AgentRequest {
            session_id: session_id.clone(),
            user_id: user,
            prompt,
        })
        .await
        .context("agent run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.response);
        eprintln!();
        eprintln!(
            "session {session_id} | request {} | {} steps | {} tokens | {} ms | {}",
            result.request_id,
            result.steps_executed.len(),
            result.total_tokens,
            result.latency_ms,
            result.provider
        );
    }
    Ok(())
}

async fn cmd_plan(settings: &AgentSettings, session: &str, words: &[String]) -> Result<()> {
    let prompt = prompt_from_words(words)?;
    let app = build_app(settings).await?;

    let plan = app.runner.plan_only(session, &prompt).await;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn cmd_tools(settings: &AgentSettings) -> Result<()> {
    let app = build_app(settings).await?;
    let schemas = app.runner.registry().list_schemas();
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

async fn cmd_steps(settings: &AgentSettings, request_id: &str) -> Result<()> {
    let app = build_app(settings).await?;
    let request = app
        .runs
        .get_request(request_id)
        .await
        .with_context(|| format!("request {request_id} not found"))?;
    let steps = app.runs.list_steps(request_id).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "request": request,
            "steps": steps,
        }))?
    );
    Ok(())
}

async fn cmd_memory(settings: &AgentSettings, session_id: &str) -> Result<()> {
    let app = build_app(settings).await?;
    let entries = app.memory.session_entries(session_id).await?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
