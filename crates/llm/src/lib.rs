//! `ChatClient` provider boundary: message/tool-call wire types, the async
//! trait every provider implements, an OpenAI-compatible HTTP adapter, and a
//! deterministic scripted client for tests.

pub mod client;
pub mod error;
pub mod http_client;
pub mod message;
pub mod scripted;

pub use client::ChatClient;
pub use error::LlmError;
pub use http_client::HttpChatClient;
pub use message::{
    ChatCompletion, ChatMessage, ChatRequest, ChatRole, FinishReason, StreamDelta, ToolCallRequest, ToolSchema, Usage,
};
pub use scripted::ScriptedChatClient;
