//! Agent administration and configuration endpoints (spec §6).
//!
//! Grounded on `skynet-gateway`'s `http/` resource modules: one file per
//! resource, each exporting a `router()` merged in `build_router`, handlers
//! taking `State<Arc<AppState>>` + `Path`/`Query`/`Json` extractors and
//! returning `Result<Json<_>, ApiError>`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conclave_agent::{Agent, AgentConfig, AgentConfigPatch, MemoryBlock};
use conclave_core::{AgentId, VersionId};

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/{id}", get(get_agent))
        .route("/agents/{id}/config", get(get_config).put(patch_config))
        .route("/agents/{id}/versions", get(list_versions))
        .route("/agents/{id}/versions/{vid}/rollback", axum::routing::post(rollback))
        .route("/agents/{id}/system-prompt", get(get_system_prompt).put(put_system_prompt))
        .route("/agents/{id}/memory/blocks", get(list_memory_blocks))
        .route("/agents/{id}/memory/blocks/{label}", put(put_memory_block))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<Agent>> {
    Json(state.agents.list())
}

async fn get_agent(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.agents.get(AgentId(id))?))
}

async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentConfig>, ApiError> {
    Ok(Json(state.agents.get_current(AgentId(id))?))
}

#[derive(Debug, Deserialize)]
struct ConfigPatchRequest {
    #[serde(flatten)]
    patch: AgentConfigPatch,
    #[serde(default = "default_description")]
    description: String,
}

fn default_description() -> String {
    "config update".to_string()
}

#[derive(Debug, Serialize)]
struct VersionCreated {
    version_id: VersionId,
}

async fn patch_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfigPatchRequest>,
) -> Result<Json<VersionCreated>, ApiError> {
    let updated = state.agents.update(AgentId(id), body.patch, body.description).await?;
    Ok(Json(VersionCreated { version_id: updated.version_id }))
}

#[derive(Debug, Deserialize)]
struct VersionsQuery {
    #[serde(default = "default_versions_limit")]
    limit: usize,
}

fn default_versions_limit() -> usize {
    20
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<VersionsQuery>,
) -> Result<Json<Vec<AgentConfig>>, ApiError> {
    Ok(Json(state.agents.list_versions(AgentId(id), q.limit)?))
}

async fn rollback(
    State(state): State<Arc<AppState>>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
) -> Result<Json<AgentConfig>, ApiError> {
    Ok(Json(state.agents.rollback(AgentId(id), VersionId(vid)).await?))
}

#[derive(Debug, Serialize)]
struct SystemPromptResponse {
    system_prompt: String,
}

async fn get_system_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SystemPromptResponse>, ApiError> {
    let config = state.agents.get_current(AgentId(id))?;
    Ok(Json(SystemPromptResponse { system_prompt: config.system_prompt }))
}

#[derive(Debug, Deserialize)]
struct SystemPromptPatch {
    system_prompt: String,
}

async fn put_system_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SystemPromptPatch>,
) -> Result<Json<VersionCreated>, ApiError> {
    let patch = AgentConfigPatch { system_prompt: Some(body.system_prompt), ..Default::default() };
    let updated = state.agents.update(AgentId(id), patch, "system prompt update").await?;
    Ok(Json(VersionCreated { version_id: updated.version_id }))
}

async fn list_memory_blocks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemoryBlock>>, ApiError> {
    Ok(Json(state.agents.list_memory_blocks(AgentId(id))?))
}

#[derive(Debug, Deserialize)]
struct BlockValuePatch {
    value: String,
}

async fn put_memory_block(
    State(state): State<Arc<AppState>>,
    Path((id, label)): Path<(Uuid, String)>,
    Json(body): Json<BlockValuePatch>,
) -> Result<Json<MemoryBlock>, ApiError> {
    Ok(Json(state.agents.set_memory_block_value(AgentId(id), &label, body.value).await?))
}
