//! Summarization errors (spec §7: `summarization_failed`).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SummarizeError {
    #[error("no messages at or before the requested sequence")]
    EmptyPrefix,
    #[error("model returned an empty summary")]
    EmptySummary,
    #[error("llm call failed: {0}")]
    Llm(String),
    #[error("conversation store error: {0}")]
    Storage(String),
}

impl SummarizeError {
    pub fn kind(&self) -> conclave_core::ErrorKind {
        conclave_core::ErrorKind::SummarizationFailed
    }
}
