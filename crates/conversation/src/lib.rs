pub mod schema;
pub mod store;

pub use schema::{ErrorReason, Message, MessageType, Role, ToolCall};
pub use store::ConversationStore;
