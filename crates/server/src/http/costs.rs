//! Cost & usage reporting endpoints (spec §6/§4.12).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use conclave_cost::{CostStatistics, ProviderBalance};

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/costs/statistics", get(statistics))
        .route("/costs/openrouter", get(openrouter))
}

async fn statistics(State(state): State<Arc<AppState>>) -> Json<CostStatistics> {
    Json(state.costs.statistics().await)
}

/// `GET /costs/openrouter` — authoritative provider-side totals, distinct
/// from the local accumulation in `/costs/statistics` (spec §9's "two cost
/// trackers" design note). `404` when no provider-native source is
/// configured rather than a zeroed balance, so a client can tell "no
/// provider configured" apart from "provider reports zero usage".
async fn openrouter(State(state): State<Arc<AppState>>) -> Result<Json<ProviderBalance>, StatusCode> {
    state.costs.statistics().await.provider_native.map(Json).ok_or(StatusCode::NOT_FOUND)
}
