//! SSE frame kinds for `POST /agents/{id}/chat/stream` (spec §6).
//!
//! Grounded on `skynet-gateway`'s `http/openai_compat.rs` SSE handler, which
//! builds an `axum::response::sse::Event` per chunk with `event(...).data(...)`
//! rather than hand-formatting the `event:`/`data:` wire lines.

use axum::response::sse::Event;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    ThinkingDelta { text: String },
    ContentDelta { text: String },
    ToolCall { id: String, name: String, arguments: serde_json::Value },
    ToolResult { id: String, result: Option<serde_json::Value>, error: Option<String> },
    Done { usage: conclave_context::UsageBreakdown, wall_time_ms: u64, tool_calls: usize },
    Error { kind: conclave_core::ErrorKind, message: String },
}

impl Frame {
    pub fn into_event(self) -> Event {
        let name = match &self {
            Frame::ThinkingDelta { .. } => "thinking_delta",
            Frame::ContentDelta { .. } => "content_delta",
            Frame::ToolCall { .. } => "tool_call",
            Frame::ToolResult { .. } => "tool_result",
            Frame::Done { .. } => "done",
            Frame::Error { .. } => "error",
        };
        Event::default().event(name).data(serde_json::to_string(&self).unwrap_or_default())
    }
}
