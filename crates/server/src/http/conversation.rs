//! Conversation browsing/maintenance endpoints (spec §6, §4.10, §4.13).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conclave_conversation::Message;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversation/{session}", get(list_messages))
        .route("/conversation/{session}/clear", post(clear))
        .route("/conversation/{session}/summarize", post(summarize_now))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    cursor: Option<u64>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
struct ListResponse {
    messages: Vec<Message>,
    next_cursor: Option<u64>,
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let (messages, next_cursor) = state.conversations.list(session, q.limit, q.cursor).await?;
    Ok(Json(ListResponse { messages, next_cursor }))
}

async fn clear(State(state): State<Arc<AppState>>, Path(session): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    state.conversations.clear(session).await?;
    Ok(Json(serde_json::json!({ "cleared": true })))
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: Option<String>,
}

/// `POST /conversation/{session}/summarize` — force-summarizes now (spec §6,
/// scenario E3). `model` is optional in the body because a session is not
/// itself bound to an agent; when absent we fall back to the first
/// configured model family's default by asking the caller's own default
/// agent config is not available here, so a model must be supplied unless
/// the session id happens to equal an agent id (the default-session
/// convention from [`AppState::default_session`]).
async fn summarize_now(
    State(state): State<Arc<AppState>>,
    Path(session): Path<Uuid>,
    body: Option<Json<SummarizeRequest>>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let requested_model = body.and_then(|b| b.0.model);
    let model = match requested_model {
        Some(m) => m,
        None => state
            .agents
            .get_current(conclave_core::AgentId(session))
            .map(|c| c.model)
            .unwrap_or_else(|_| "unknown".to_string()),
    };
    let summary = conclave_summarizer::summarize_all(
        state.llm.as_ref(),
        &state.conversations,
        &model,
        session,
        state.config.context.summary_target_tokens,
    )
    .await?;
    Ok(Json(SummarizeResponse { summary }))
}
