//! `conclaved` — the stateful conversational-agent daemon (spec §1/§6).
//!
//! Grounded on `skynet-gateway`'s `main.rs` for the serve path (load config,
//! build `Arc<AppState>`, build the router, `TcpListener` + `axum::serve`
//! with graceful shutdown) and on the teacher's `aigent-app/src/main.rs` for
//! the `clap` derive `Cli`/`Subcommand` shape and `dotenvy` +
//! `tracing_subscriber` startup sequence — generalized from the teacher's
//! TUI/Telegram frontends to an HTTP daemon plus a small set of admin
//! subcommands, since agents are "created explicitly ... by admin action"
//! (spec §3) rather than through the chat surface itself.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use conclave_agent::{AgentConfig, AgentStore};
use conclave_conversation::ConversationStore;
use conclave_core::config::AppConfig;
use conclave_cost::CostTracker;
use conclave_llm::{ChatClient, HttpChatClient};
use conclave_memory::{AssociationGraph, HierarchicalMemory, MemoryStore};
use conclave_reasoning::ReasoningLoop;
use conclave_server::AppState;

#[derive(Debug, Parser)]
#[command(name = "conclaved", version, about = "Stateful conversational-agent server")]
struct Cli {
    /// Path to the TOML config file (defaults exist for every field).
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP/SSE server (the default when no subcommand is given).
    Serve {
        /// Point the LLM client at a local OpenAI-compatible endpoint
        /// (e.g. Ollama) that needs no API key, instead of requiring
        /// `CONCLAVE_LLM_API_KEY`.
        #[arg(long)]
        local: bool,
        #[arg(long, default_value = "http://localhost:11434/v1")]
        local_base_url: String,
    },
    /// Agent administration (spec §3: agents are created/deleted by admin
    /// action, not through the chat surface).
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
}

#[derive(Debug, Subcommand)]
enum AgentCommands {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        #[arg(long, default_value = "You are a helpful assistant.")]
        system_prompt: String,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config).unwrap_or_default();

    let file_appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, "conclaved.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.telemetry.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .init();

    let data_dir = PathBuf::from(&config.storage.data_dir);
    let agents = Arc::new(AgentStore::new(data_dir.join("agents"))?);

    match cli.command.unwrap_or(Commands::Serve {
        local: false,
        local_base_url: "http://localhost:11434/v1".to_string(),
    }) {
        Commands::Agent { command } => run_agent_command(agents, command).await,
        Commands::Serve { local, local_base_url } => run_serve(config, data_dir, agents, local, local_base_url).await,
    }
}

async fn run_agent_command(agents: Arc<AgentStore>, command: AgentCommands) -> Result<()> {
    match command {
        AgentCommands::Create { name, model, system_prompt } => {
            let genesis = AgentConfig::genesis(model, system_prompt);
            let agent = agents.create(name, genesis).await?;
            println!("created agent {} ({})", agent.id, agent.display_name);
            Ok(())
        }
        AgentCommands::List => {
            for agent in agents.list() {
                println!("{}  {}  active={}", agent.id, agent.display_name, agent.active);
            }
            Ok(())
        }
    }
}

/// `init → ready → shutdown` (spec §9): every store is opened before the
/// listener binds, and `axum::serve`'s graceful shutdown lets in-flight
/// turns finish (each turn's own data is fsync'd to its event log as it
/// goes, so there is nothing further to flush on the way out).
async fn run_serve(
    config: AppConfig,
    data_dir: PathBuf,
    agents: Arc<AgentStore>,
    local: bool,
    local_base_url: String,
) -> Result<()> {
    let conversations = Arc::new(ConversationStore::new(data_dir.join("conversations")));
    let memory_store = MemoryStore::open(data_dir.join("memory"))?;
    let graph = AssociationGraph::open(data_dir.join("memory_graph"))?;
    let memory = Arc::new(HierarchicalMemory::new(
        memory_store,
        graph,
        config.hierarchy.clone(),
        config.retention.clone(),
        config.learner.clone(),
    ));
    let costs = Arc::new(CostTracker::open(data_dir.join("costs"))?);

    let llm: Arc<dyn ChatClient> = if local {
        Arc::new(HttpChatClient::new(local_base_url, String::new()))
    } else if let Ok(api_key) = env::var("CONCLAVE_LLM_API_KEY") {
        let base_url = env::var("CONCLAVE_LLM_BASE_URL").unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        Arc::new(HttpChatClient::new(base_url, api_key))
    } else {
        bail!(
            "CONCLAVE_LLM_API_KEY is not set; pass --local to run against a local OpenAI-compatible \
             endpoint instead"
        );
    };

    let reasoning = Arc::new(ReasoningLoop::new(
        llm.clone(),
        agents.clone(),
        conversations.clone(),
        memory.clone(),
        costs.clone(),
        config.r#loop.clone(),
        config.context.clone(),
    ));

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, agents, conversations, memory, costs, reasoning, llm));
    let router = conclave_server::build_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "conclaved listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight turns");
}
