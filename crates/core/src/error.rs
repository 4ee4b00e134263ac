//! Shared error taxonomy (spec §7).
//!
//! Every crate's leaf error type converts into [`ErrorKind`] so the HTTP
//! boundary and the reasoning loop can report a single, stable set of error
//! kinds regardless of which subsystem raised them.

use serde::{Deserialize, Serialize};

/// One of the error categories enumerated in spec §7.
///
/// The wire representation is the lowercase snake_case name (`"tool_timeout"`,
/// `"budget_exceeded"`, …) so it can be embedded verbatim in an SSE `error`
/// frame or an `assistant(kind=error)` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Unauthorized,
    ProviderTransient,
    ProviderPermanent,
    ToolError,
    ToolTimeout,
    StepLimit,
    ToolLimit,
    TurnTimeout,
    BudgetExceeded,
    ContextOverflowFixed,
    SummarizationFailed,
    StorageError,
}

impl ErrorKind {
    /// Whether this kind should be retried locally rather than surfaced
    /// immediately (spec §7 propagation policy).
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ProviderTransient)
    }

    /// Whether a turn in progress must terminate (vs. feeding the error back
    /// to the model as a tool result and continuing).
    pub fn terminates_turn(self) -> bool {
        !matches!(self, ErrorKind::ToolError)
    }
}

/// A structured, user-facing error: a stable [`ErrorKind`] plus a free-text
/// message. This is the shape serialized into SSE `error` frames and into
/// `assistant(kind=error)` message bodies.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ConclaveError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ConclaveError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Convenience constructors, one per [`ErrorKind`] variant.
macro_rules! ctor {
    ($name:ident, $variant:ident) => {
        pub fn $name(message: impl Into<String>) -> ConclaveError {
            ConclaveError::new(ErrorKind::$variant, message)
        }
    };
}

pub mod kind {
    use super::{ConclaveError, ErrorKind};

    ctor!(invalid_request, InvalidRequest);
    ctor!(unauthorized, Unauthorized);
    ctor!(provider_transient, ProviderTransient);
    ctor!(provider_permanent, ProviderPermanent);
    ctor!(tool_error, ToolError);
    ctor!(tool_timeout, ToolTimeout);
    ctor!(step_limit, StepLimit);
    ctor!(tool_limit, ToolLimit);
    ctor!(turn_timeout, TurnTimeout);
    ctor!(budget_exceeded, BudgetExceeded);
    ctor!(context_overflow_fixed, ContextOverflowFixed);
    ctor!(summarization_failed, SummarizationFailed);
    ctor!(storage_error, StorageError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_transient_is_retryable() {
        assert!(ErrorKind::ProviderTransient.is_retryable());
        assert!(!ErrorKind::ProviderPermanent.is_retryable());
    }

    #[test]
    fn tool_error_does_not_terminate_turn() {
        assert!(!ErrorKind::ToolError.terminates_turn());
        assert!(ErrorKind::StepLimit.terminates_turn());
    }

    #[test]
    fn serializes_snake_case() {
        let e = kind::budget_exceeded("turn cost exceeded $1.00");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "budget_exceeded");
    }
}
