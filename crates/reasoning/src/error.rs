//! Errors the reasoning loop itself can raise (spec §7) — distinct from the
//! `ErrorReason`s a turn can *end with*, which are recorded on the persisted
//! assistant message rather than returned as a `Result::Err` (every bound in
//! spec §4.9 ends the turn gracefully, it does not abort the call).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("context assembly failed: {0}")]
    Context(#[from] conclave_context::ContextError),
    #[error("agent store error: {0}")]
    Agent(#[from] conclave_agent::AgentError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ReasoningError {
    pub fn kind(&self) -> conclave_core::ErrorKind {
        match self {
            ReasoningError::Context(e) => e.kind(),
            ReasoningError::Agent(_) => conclave_core::ErrorKind::StorageError,
            ReasoningError::Storage(_) => conclave_core::ErrorKind::StorageError,
        }
    }
}

/// The human-readable body of the `assistant(kind=error)` message persisted
/// for each way a turn can end early (spec §4.9/§7).
pub fn default_error_text(reason: conclave_conversation::ErrorReason) -> &'static str {
    use conclave_conversation::ErrorReason::*;
    match reason {
        StepLimit => "The turn ended because it reached the maximum number of reasoning steps.",
        ToolLimit => "The turn ended because it reached the maximum number of tool calls.",
        Timeout => "The turn ended because it exceeded its time budget.",
        BudgetExceeded => "The turn ended because it exceeded its cost budget.",
        ClientDisconnect => "The turn ended because the client disconnected.",
        ContextOverflowFixed => {
            "The turn could not start: the agent's fixed context (system prompt, memory \
             blocks, tool schemas) exceeds the model's context window."
        }
        ProviderPermanent => "The turn ended because the model provider returned an error.",
        SummarizationFailed => "The turn ended because summarization failed.",
    }
}
