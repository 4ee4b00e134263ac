use thiserror::Error;

use conclave_core::{AgentId, VersionId};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent {0} not found")]
    NotFound(AgentId),
    #[error("version {0} not found for agent {1}")]
    VersionNotFound(VersionId, AgentId),
    #[error("memory block '{0}' not found")]
    BlockNotFound(String),
    #[error("memory block '{0}' is read-only")]
    BlockReadOnly(String),
    #[error("memory block '{0}' value exceeds its {1}-char limit")]
    BlockOverLimit(String, usize),
    #[error("version chain for agent {0} is not acyclic")]
    CyclicVersionChain(AgentId),
    #[error("storage failure: {0}")]
    Storage(String),
}
