//! Context assembly errors (spec §4.7 step 1, §7 `context_overflow_fixed`).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// Spec §4.7 step 1: the system prompt, memory blocks, and tool schemas
    /// alone already exceed `max_tokens * 0.9`. No LLM call is made (spec
    /// invariant 12).
    #[error("fixed context cost {fixed} exceeds 90% of the {max}-token budget")]
    FixedCostExceeded { fixed: usize, max: usize },
}

impl ContextError {
    pub fn kind(&self) -> conclave_core::ErrorKind {
        conclave_core::ErrorKind::ContextOverflowFixed
    }
}
