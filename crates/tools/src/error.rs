//! Structured tool errors (spec §7: `tool_error`, `tool_timeout`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("arguments failed schema validation: {0}")]
    SchemaValidation(String),
    #[error("tool handler error: {0}")]
    HandlerError(String),
    #[error("tool timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ToolError {
    pub fn kind(&self) -> conclave_core::ErrorKind {
        match self {
            ToolError::Timeout { .. } => conclave_core::ErrorKind::ToolTimeout,
            _ => conclave_core::ErrorKind::ToolError,
        }
    }
}
