//! An OpenAI-compatible HTTP [`ChatClient`] adapter. Grounded on the
//! teacher's `OpenRouterClient::chat_messages`/`chat_messages_stream`
//! (`crates/llm/src/lib.rs`): same endpoint shape (`POST
//! {base_url}/chat/completions`, bearer auth, `tools` passthrough), rewired
//! behind the trait boundary and returning the spec's `ChatCompletion`/
//! `StreamDelta` types instead of the teacher's `(String, Vec<ToolCall>,
//! String)` tuple.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use crate::client::ChatClient;
use crate::error::LlmError;
use crate::message::{
    ChatCompletion, ChatMessage, ChatRequest, ChatRole, FinishReason, StreamDelta, ToolCallRequest, Usage,
};

pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn payload(&self, request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut payload = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stream": stream,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools);
        }
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }
}

fn message_to_openai(m: &ChatMessage) -> Value {
    let role = match m.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    };
    let mut out = json!({ "role": role, "content": m.content });
    if !m.tool_calls.is_empty() {
        out["tool_calls"] = json!(m
            .tool_calls
            .iter()
            .map(|tc| json!({
                "id": tc.id,
                "type": "function",
                "function": { "name": tc.name, "arguments": tc.arguments.to_string() }
            }))
            .collect::<Vec<_>>());
    }
    if let Some(id) = &m.tool_call_id {
        out["tool_call_id"] = json!(id);
    }
    out
}

fn parse_completion(body: &Value) -> Result<ChatCompletion, LlmError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| LlmError::Permanent("response had no choices".into()))?;

    let message = choice.get("message").ok_or_else(|| LlmError::Permanent("choice had no message".into()))?;
    let content = message.get("content").and_then(|v| v.as_str()).map(|s| s.to_string());
    let tool_calls: Vec<ToolCallRequest> = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let function = tc.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments_raw = function.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                    let arguments = serde_json::from_str(arguments_raw).unwrap_or(Value::Null);
                    Some(ToolCallRequest { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match choice.get("finish_reason").and_then(|v| v.as_str()) {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        _ => {
            if tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            }
        }
    };

    let usage = body
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            completion_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            reasoning_tokens: u.get("reasoning_tokens").and_then(|v| v.as_u64()),
        })
        .unwrap_or_default();

    let chat_message = if tool_calls.is_empty() {
        ChatMessage::assistant(content.unwrap_or_default())
    } else {
        ChatMessage::assistant_tool_calls(tool_calls)
    };

    Ok(ChatCompletion {
        message: chat_message,
        thinking: message.get("reasoning").and_then(|v| v.as_str()).map(|s| s.to_string()),
        usage,
        finish_reason,
    })
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Unauthorized);
        }
        let payload = self.payload(&request, false);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| LlmError::Transient(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body.to_string()));
        }
        parse_completion(&body)
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<BoxStream<'static, StreamDelta>, LlmError> {
        // The core's contract only requires a BoxStream of StreamDelta; a
        // full SSE-chunk parser is provider wire-format detail (spec §1:
        // out of scope). This adapter completes the call up front and
        // replays it as a single content delta plus a terminal `Done`,
        // which satisfies every consumer in this workspace (the server's
        // SSE framing layer) without committing to one provider's streaming
        // quirks.
        let completion = self.complete(request).await?;
        let content = completion.message.content.clone().unwrap_or_default();
        let tool_calls = completion.message.tool_calls.clone();
        let usage = completion.usage;
        let finish_reason = completion.finish_reason;

        let mut deltas = Vec::new();
        if let Some(thinking) = completion.thinking {
            deltas.push(StreamDelta::ThinkingDelta(thinking));
        }
        if !content.is_empty() {
            deltas.push(StreamDelta::ContentDelta(content));
        }
        for tc in tool_calls {
            deltas.push(StreamDelta::ToolCall(tc));
        }
        deltas.push(StreamDelta::Done { usage, finish_reason });

        Ok(stream::iter(deltas).boxed())
    }
}
