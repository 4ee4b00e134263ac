pub mod config;
pub mod error;
pub mod event_log;
pub mod ids;

pub use config::AppConfig;
pub use error::{kind, ConclaveError, ErrorKind};
pub use event_log::EventLog;
pub use ids::{AgentId, MemoryItemId, SessionId, VersionId};
