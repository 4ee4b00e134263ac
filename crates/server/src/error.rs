//! Maps every leaf error type into the HTTP surface's `{kind, message}`
//! JSON shape (spec §6 SSE `error` frame / §7 propagation policy).
//!
//! Grounded on the teacher's `OpenAiError` (`skynet-gateway`'s
//! `http/openai_compat.rs`) — a small `(StatusCode, Json<...>)` wrapper type
//! every handler converts its error into, rather than one handler per error
//! shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conclave_core::ErrorKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::ProviderPermanent => StatusCode::BAD_GATEWAY,
            ErrorKind::ProviderTransient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ContextOverflowFixed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::SummarizationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ToolError
            | ErrorKind::ToolTimeout
            | ErrorKind::StepLimit
            | ErrorKind::ToolLimit
            | ErrorKind::TurnTimeout
            | ErrorKind::BudgetExceeded
            | ErrorKind::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = ?self.kind, message = %self.message, "request failed");
        }
        (status, Json(serde_json::json!({ "kind": self.kind, "message": self.message }))).into_response()
    }
}

/// `GET /agents/{id}` and friends: agent/version/block lookups that fail
/// are `invalid_request`s (spec §7: "unknown agent/session").
impl From<conclave_agent::AgentError> for ApiError {
    fn from(err: conclave_agent::AgentError) -> Self {
        use conclave_agent::AgentError::*;
        match err {
            BlockOverLimit(..) | BlockReadOnly(_) => ApiError::new(ErrorKind::InvalidRequest, err.to_string()),
            NotFound(_) | VersionNotFound(..) | BlockNotFound(_) => {
                ApiError::new(ErrorKind::InvalidRequest, err.to_string())
            }
            CyclicVersionChain(_) | Storage(_) => ApiError::new(ErrorKind::StorageError, err.to_string()),
        }
    }
}

impl From<conclave_reasoning::ReasoningError> for ApiError {
    fn from(err: conclave_reasoning::ReasoningError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<conclave_context::ContextError> for ApiError {
    fn from(err: conclave_context::ContextError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<conclave_summarizer::SummarizeError> for ApiError {
    fn from(err: conclave_summarizer::SummarizeError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::new(ErrorKind::StorageError, err.to_string())
    }
}
