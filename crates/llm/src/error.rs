//! Provider error classification (spec §7: `unauthorized`,
//! `provider_transient`, `provider_permanent`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum LlmError {
    #[error("missing or invalid provider credentials")]
    Unauthorized,
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl LlmError {
    pub fn kind(&self) -> conclave_core::ErrorKind {
        match self {
            LlmError::Unauthorized => conclave_core::ErrorKind::Unauthorized,
            LlmError::Transient(_) => conclave_core::ErrorKind::ProviderTransient,
            LlmError::Permanent(_) => conclave_core::ErrorKind::ProviderPermanent,
        }
    }

    /// Classify an HTTP status code the way spec §7 does: 401/403 is
    /// `Unauthorized`, 5xx (and 408/429) is `Transient`, every other 4xx is
    /// `Permanent`.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => LlmError::Unauthorized,
            408 | 429 => LlmError::Transient(body),
            s if s >= 500 => LlmError::Transient(body),
            _ => LlmError::Permanent(body),
        }
    }
}
