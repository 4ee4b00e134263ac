//! A deterministic, local [`ChatClient`] for tests — no network, no
//! nondeterminism. Grounded on the teacher's test-tooling style (plain
//! `#[tokio::test]`s with hand-built fixtures); generalized into a reusable
//! "scripted model" since the spec's own E4 scenario ("a scripted model
//! that always returns a tool_call to a no-op tool") requires exactly this.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::client::ChatClient;
use crate::error::LlmError;
use crate::message::{ChatCompletion, ChatRequest, FinishReason, StreamDelta, Usage};

/// A fixed, ordered sequence of responses. Each call to `complete` consumes
/// the next entry; the last entry repeats once exhausted so a misbehaving
/// caller making extra calls doesn't panic the test.
pub struct ScriptedChatClient {
    script: Vec<ChatCompletion>,
    cursor: AtomicUsize,
}

impl ScriptedChatClient {
    pub fn new(script: Vec<ChatCompletion>) -> Self {
        assert!(!script.is_empty(), "ScriptedChatClient needs at least one response");
        Self { script, cursor: AtomicUsize::new(0) }
    }

    /// A script that always returns a tool call to `tool_name` — the shape
    /// spec scenario E4 (step-limit exceeded) exercises.
    pub fn always_calls(tool_name: &str) -> Self {
        use crate::message::{ChatMessage, ToolCallRequest};
        let completion = ChatCompletion {
            message: ChatMessage::assistant_tool_calls(vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: tool_name.to_string(),
                arguments: serde_json::json!({}),
            }]),
            thinking: None,
            usage: Usage { prompt_tokens: 10, completion_tokens: 5, reasoning_tokens: None },
            finish_reason: FinishReason::ToolCalls,
        };
        Self::new(vec![completion])
    }

    pub fn calls_made(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let bounded = idx.min(self.script.len() - 1);
        Ok(self.script[bounded].clone())
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<BoxStream<'static, StreamDelta>, LlmError> {
        let completion = self.complete(request).await?;
        let mut deltas = Vec::new();
        if let Some(content) = completion.message.content.clone() {
            if !content.is_empty() {
                deltas.push(StreamDelta::ContentDelta(content));
            }
        }
        for tc in completion.message.tool_calls.clone() {
            deltas.push(StreamDelta::ToolCall(tc));
        }
        deltas.push(StreamDelta::Done { usage: completion.usage, finish_reason: completion.finish_reason });
        Ok(stream::iter(deltas).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;

    fn req() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: None,
            reasoning_enabled: false,
            max_reasoning_tokens: None,
        }
    }

    #[tokio::test]
    async fn always_calls_repeats_the_same_tool_call() {
        let client = ScriptedChatClient::always_calls("noop");
        let first = client.complete(req()).await.unwrap();
        let second = client.complete(req()).await.unwrap();
        assert_eq!(first.message.tool_calls[0].name, "noop");
        assert_eq!(second.message.tool_calls[0].name, "noop");
        assert_eq!(client.calls_made(), 2);
    }

    #[tokio::test]
    async fn scripted_sequence_advances_then_holds_last() {
        let client = ScriptedChatClient::new(vec![
            ChatCompletion {
                message: ChatMessage::assistant("first"),
                thinking: None,
                usage: Usage::default(),
                finish_reason: FinishReason::Stop,
            },
            ChatCompletion {
                message: ChatMessage::assistant("second"),
                thinking: None,
                usage: Usage::default(),
                finish_reason: FinishReason::Stop,
            },
        ]);
        assert_eq!(client.complete(req()).await.unwrap().message.content, Some("first".into()));
        assert_eq!(client.complete(req()).await.unwrap().message.content, Some("second".into()));
        assert_eq!(client.complete(req()).await.unwrap().message.content, Some("second".into()));
    }
}
