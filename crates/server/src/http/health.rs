//! `GET /health` — grounded on `skynet-gateway`'s `http/health.rs`.

use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
