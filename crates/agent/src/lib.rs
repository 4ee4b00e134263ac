//! C11 — Agent identity, versioned configuration, memory blocks.

pub mod error;
pub mod schema;
pub mod store;

pub use error::AgentError;
pub use schema::{Agent, AgentConfig, AgentConfigPatch, MemoryBlock};
pub use store::{AgentStore, ConfigChanged};
