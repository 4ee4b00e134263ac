//! Data model for the conversation store (spec §3: `Message`, `ToolCall`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Inbox,
    System,
}

/// Why an assistant message of `kind=error` was produced (spec §7/§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    StepLimit,
    ToolLimit,
    Timeout,
    BudgetExceeded,
    ClientDisconnect,
    ContextOverflowFixed,
    ProviderPermanent,
    SummarizationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub session_id: Uuid,
    /// Monotonically increasing per session (spec invariant 1). Assigned by
    /// the store, not the caller.
    pub seq: u64,
    pub role: Role,
    pub content: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub reasoning_time_ms: Option<u64>,
    #[serde(default)]
    pub error_reason: Option<ErrorReason>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(session_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            session_id,
            seq: 0,
            role: Role::User,
            content: content.into(),
            message_type: MessageType::Inbox,
            tool_calls: Vec::new(),
            thinking: None,
            reasoning_time_ms: None,
            error_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(session_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            session_id,
            seq: 0,
            role: Role::Assistant,
            content: content.into(),
            message_type: MessageType::Inbox,
            tool_calls: Vec::new(),
            thinking: None,
            reasoning_time_ms: None,
            error_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant_error(session_id: Uuid, reason: ErrorReason, content: impl Into<String>) -> Self {
        let mut m = Self::assistant(session_id, content);
        m.error_reason = Some(reason);
        m
    }

    pub fn tool_result(session_id: Uuid, call_id: &str, result: serde_json::Value) -> Self {
        Self {
            session_id,
            seq: 0,
            role: Role::Tool,
            content: call_id.to_string(),
            message_type: MessageType::Inbox,
            tool_calls: vec![ToolCall {
                id: call_id.to_string(),
                name: String::new(),
                arguments: serde_json::Value::Null,
                result: Some(result),
                error: None,
                duration_ms: None,
            }],
            thinking: None,
            reasoning_time_ms: None,
            error_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn system_summary(session_id: Uuid, summary: impl Into<String>) -> Self {
        Self {
            session_id,
            seq: 0,
            role: Role::System,
            content: summary.into(),
            message_type: MessageType::System,
            tool_calls: Vec::new(),
            thinking: None,
            reasoning_time_ms: None,
            error_reason: None,
            created_at: Utc::now(),
        }
    }
}
