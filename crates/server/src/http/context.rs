//! `GET /context/usage?session_id=&agent_id=` (spec §6/§4.7).
//!
//! The spec's table names only `session_id`; since a session is not itself
//! bound to an agent in this store's data model, `agent_id` is accepted as a
//! second required query parameter (recorded as an Open Question resolution
//! in DESIGN.md) and defaults to the [`AppState::default_session`]
//! convention when omitted — i.e. the common case of calling this against
//! the agent's own default session needs only `agent_id`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use conclave_context::UsageBreakdown;
use conclave_core::AgentId;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/context/usage", get(usage))
}

#[derive(Debug, Deserialize)]
struct UsageQuery {
    agent_id: Uuid,
    session_id: Option<Uuid>,
}

async fn usage(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UsageQuery>,
) -> Result<Json<UsageBreakdown>, ApiError> {
    let agent_id = AgentId(q.agent_id);
    let session_id = q.session_id.unwrap_or_else(|| AppState::default_session(agent_id));
    Ok(Json(state.usage_snapshot(agent_id, session_id).await?))
}
