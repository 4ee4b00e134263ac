//! `GET /models` (spec §6) — the model families the token counter and cost
//! tracker recognize, surfaced so a client can populate a model picker
//! without hardcoding the list itself.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

#[derive(Debug, Serialize)]
struct ModelFamilyInfo {
    family: &'static str,
    example_model: &'static str,
    supports_reasoning: bool,
}

async fn list_models() -> Json<Vec<ModelFamilyInfo>> {
    Json(vec![
        ModelFamilyInfo { family: "gpt", example_model: "gpt-4o", supports_reasoning: true },
        ModelFamilyInfo { family: "claude", example_model: "claude-3-7-sonnet", supports_reasoning: true },
        ModelFamilyInfo { family: "llama", example_model: "llama3.1", supports_reasoning: false },
        ModelFamilyInfo { family: "unknown", example_model: "", supports_reasoning: false },
    ])
}
