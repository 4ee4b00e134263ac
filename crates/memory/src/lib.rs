pub mod attention;
pub mod hierarchy;
pub mod learner;
pub mod retention;
pub mod schema;
pub mod store;

pub use attention::{analyze_query, AttentionMode, AttentionScore};
pub use hierarchy::{HierarchicalMemory, ScoredMemoryItem};
pub use learner::AssociationGraph;
pub use retention::{retention_action, retention_score};
pub use schema::{Association, Feedback, MemoryCategory, MemoryItem, MemoryTier, RetentionAction, SourceTag};
pub use store::{MemoryFilter, MemoryStore};
