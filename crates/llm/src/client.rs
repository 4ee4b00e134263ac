//! The `ChatClient` trait boundary (spec §1: "the LLM provider HTTP client"
//! is out of scope; only this trait is specified). Generalizes the
//! teacher's separate `OllamaClient`/`OpenRouterClient` structs — which
//! share method names but no common trait — into one seam the reasoning
//! loop programs against.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::LlmError;
use crate::message::{ChatCompletion, ChatRequest, StreamDelta};

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError>;

    async fn complete_stream(&self, request: ChatRequest) -> Result<BoxStream<'static, StreamDelta>, LlmError>;
}
