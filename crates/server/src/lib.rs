//! The HTTP/SSE surface (spec §6) — every external entrypoint into the
//! stateful agent server sits behind this crate; every other crate is
//! transport-agnostic.
//!
//! Grounded on the `skynet-gateway` crate's `app.rs::build_router`: one
//! `Arc<AppState>` threaded through `with_state`, one `Router` assembled from
//! small per-resource modules, `tower_http::trace::TraceLayer` and `cors`
//! wired the same way the teacher wires them.

pub mod error;
pub mod http;
pub mod sse;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use conclave_agent::AgentStore;
use conclave_context::UsageBreakdown;
use conclave_conversation::ConversationStore;
use conclave_core::config::AppConfig;
use conclave_cost::CostTracker;
use conclave_llm::ChatClient;
use conclave_memory::HierarchicalMemory;
use conclave_reasoning::ReasoningLoop;

/// Shared application state, cloned (cheaply, via `Arc`) into every handler.
///
/// `reasoning` already owns `Arc` clones of `agents`/`conversations`/`memory`/
/// `costs` internally (spec C9 composes C2/C7/C8/C10/C11/C12); the top-level
/// state keeps its own clones too because several endpoints (agent admin,
/// conversation browsing, cost reporting) read those stores directly without
/// going through a turn.
pub struct AppState {
    pub config: AppConfig,
    pub agents: Arc<AgentStore>,
    pub conversations: Arc<ConversationStore>,
    pub memory: Arc<HierarchicalMemory>,
    pub costs: Arc<CostTracker>,
    pub reasoning: Arc<ReasoningLoop>,
    pub llm: Arc<dyn ChatClient>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        agents: Arc<AgentStore>,
        conversations: Arc<ConversationStore>,
        memory: Arc<HierarchicalMemory>,
        costs: Arc<CostTracker>,
        reasoning: Arc<ReasoningLoop>,
        llm: Arc<dyn ChatClient>,
    ) -> Self {
        Self { config, agents, conversations, memory, costs, reasoning, llm }
    }

    /// The session a chat request targets when the caller does not name one
    /// explicitly: one default session per agent, keyed on the agent's own
    /// id so repeated `POST /agents/{id}/chat` calls without a `session_id`
    /// keep talking to the same conversation (spec §3 leaves session
    /// lifecycle to the caller; this is the resolution recorded in
    /// DESIGN.md).
    pub fn default_session(agent_id: conclave_core::AgentId) -> uuid::Uuid {
        agent_id.0
    }

    /// Usage snapshot for a session under an agent's current config, with no
    /// pending user message (used by `GET /context/usage`).
    pub async fn usage_snapshot(
        &self,
        agent_id: conclave_core::AgentId,
        session_id: uuid::Uuid,
    ) -> Result<UsageBreakdown, error::ApiError> {
        let config = self.agents.get_current(agent_id)?;
        let memory_blocks = self.agents.list_memory_blocks(agent_id)?;
        let tool_specs = conclave_tools::builtin_specs();
        let tool_schemas: Vec<conclave_llm::ToolSchema> = tool_specs
            .iter()
            .map(|s| conclave_llm::ToolSchema {
                name: s.name.to_string(),
                description: s.description.to_string(),
                parameters: s.json_schema.clone(),
            })
            .collect();
        let history = self
            .conversations
            .all(session_id)
            .await
            .map_err(|e| error::ApiError::new(conclave_core::ErrorKind::StorageError, e.to_string()))?;

        let assembled = conclave_context::assemble(
            conclave_context::AssembleInput {
                agent_id: agent_id.0,
                session_id,
                config: &config,
                memory_blocks: &memory_blocks,
                tool_schemas: &tool_schemas,
                history: &history,
                current_user_message: "",
                memory_top_k: self.config.context.memory_top_k,
                summarization_threshold_pct: self.config.context.summarization_threshold_pct,
            },
            &self.memory,
        )?;
        Ok(assembled.usage)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(http::health::router())
        .merge(http::models::router())
        .merge(http::agents::router())
        .merge(http::chat::router())
        .merge(http::conversation::router())
        .merge(http::context::router())
        .merge(http::costs::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
