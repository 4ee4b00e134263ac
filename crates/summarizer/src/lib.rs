//! C13 — Summarizer (spec §4.13): condenses a message prefix into a single
//! system-tagged summary via the `ChatClient` boundary, then compacts the
//! conversation store through `replace_prefix_with_summary`.
//!
//! Grounded on the teacher's `runtime/sleep.rs::distill`/
//! `agentic_sleep_prompt` shape (build a condensation prompt, call the
//! model, apply the result) — retargeted from the teacher's memory-entry
//! distillation onto a message-prefix condensation, and from the teacher's
//! memory store onto `conclave_conversation::ConversationStore`.

mod error;

pub use error::SummarizeError;

use conclave_conversation::{ConversationStore, Message, Role};
use conclave_llm::{ChatClient, ChatMessage, ChatRequest};

/// Build the condensation prompt the teacher's `agentic_sleep_prompt`
/// generalizes to: instruct the model to compress `messages` into at most
/// `target_tokens` tokens, preserving facts, decisions, and open threads.
fn build_prompt(messages: &[Message], target_tokens: usize) -> Vec<ChatMessage> {
    let transcript: String = messages
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let instruction = format!(
        "Condense the following conversation prefix into a single summary of at most \
         {target_tokens} tokens. Preserve concrete facts, decisions, and open threads the \
         assistant still needs to follow up on. Do not address the user directly; write the \
         summary as a neutral third-person note for the assistant's own future reference.\n\n\
         --- CONVERSATION PREFIX ---\n{transcript}"
    );

    vec![
        ChatMessage::system(
            "You condense conversation history into compact, information-dense summaries.",
        ),
        ChatMessage::user(instruction),
    ]
}

/// `summarize(session, up_to_seq) -> summary_text` (spec §4.13): on success,
/// invokes `C10.replace_prefix_with_summary`. On failure, leaves the log
/// unchanged and surfaces the error — the caller (the reasoning loop) must
/// not silently drop messages.
pub async fn summarize(
    llm: &dyn ChatClient,
    store: &ConversationStore,
    model: &str,
    session_id: uuid::Uuid,
    up_to_seq: u64,
    target_tokens: usize,
) -> Result<String, SummarizeError> {
    let all = store
        .all(session_id)
        .await
        .map_err(|e| SummarizeError::Storage(e.to_string()))?;

    let prefix: Vec<Message> = all.into_iter().filter(|m| m.seq <= up_to_seq).collect();
    if prefix.is_empty() {
        return Err(SummarizeError::EmptyPrefix);
    }

    let request = ChatRequest {
        model: model.to_string(),
        messages: build_prompt(&prefix, target_tokens),
        tools: vec![],
        temperature: 0.2,
        top_p: 1.0,
        max_tokens: None,
        reasoning_enabled: false,
        max_reasoning_tokens: None,
    };

    let completion = llm
        .complete(request)
        .await
        .map_err(|e| SummarizeError::Llm(e.to_string()))?;

    let summary_text = completion
        .message
        .content
        .filter(|s| !s.trim().is_empty())
        .ok_or(SummarizeError::EmptySummary)?;

    store
        .replace_prefix_with_summary(session_id, up_to_seq, summary_text.clone())
        .await
        .map_err(|e| SummarizeError::Storage(e.to_string()))?;

    Ok(summary_text)
}

/// Convenience: summarize the entire session up to its latest message.
pub async fn summarize_all(
    llm: &dyn ChatClient,
    store: &ConversationStore,
    model: &str,
    session_id: uuid::Uuid,
    target_tokens: usize,
) -> Result<Option<String>, SummarizeError> {
    let all = store
        .all(session_id)
        .await
        .map_err(|e| SummarizeError::Storage(e.to_string()))?;
    let Some(last) = all.iter().filter(|m| m.role != Role::System).map(|m| m.seq).max() else {
        return Ok(None);
    };
    summarize(llm, store, model, session_id, last, target_tokens).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_llm::ScriptedChatClient;
    use uuid::Uuid;

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("conclave-summarizer-{}", Uuid::new_v4()))
    }

    fn scripted(summary: &str) -> ScriptedChatClient {
        use conclave_llm::{ChatCompletion, FinishReason, Usage};
        ScriptedChatClient::new(vec![ChatCompletion {
            message: ChatMessage::assistant(summary),
            thinking: None,
            usage: Usage { prompt_tokens: 10, completion_tokens: 5, reasoning_tokens: None },
            finish_reason: FinishReason::Stop,
        }])
    }

    #[tokio::test]
    async fn summarize_compacts_prefix_and_returns_text() {
        let store = ConversationStore::new(temp_dir());
        let session = Uuid::new_v4();
        for i in 0..5 {
            store.append(Message::user(session, format!("message {i}"))).await.unwrap();
        }
        let llm = scripted("condensed summary");
        let summary = summarize(&llm, &store, "gpt-4o", session, 3, 1500).await.unwrap();
        assert_eq!(summary, "condensed summary");

        let all = store.all(session).await.unwrap();
        // The summary is a fresh insertion with the session's highest `seq`,
        // so it sorts last in the "oldest first" ordering `all` returns.
        let summary = all.last().expect("summary present");
        assert_eq!(summary.role, Role::System);
        assert_eq!(summary.content, "condensed summary");
        assert!(all.iter().filter(|m| m.role != Role::System).all(|m| m.seq > 3));
    }

    #[tokio::test]
    async fn empty_prefix_is_rejected_without_touching_the_store() {
        let store = ConversationStore::new(temp_dir());
        let session = Uuid::new_v4();
        store.append(Message::user(session, "hi")).await.unwrap();
        let llm = scripted("should not be used");
        let err = summarize(&llm, &store, "gpt-4o", session, 0, 1500).await.unwrap_err();
        assert!(matches!(err, SummarizeError::EmptyPrefix));
        assert_eq!(store.all(session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn llm_failure_leaves_log_unchanged() {
        use conclave_llm::LlmError;
        struct Failing;
        #[async_trait::async_trait]
        impl ChatClient for Failing {
            async fn complete(&self, _r: ChatRequest) -> Result<conclave_llm::ChatCompletion, LlmError> {
                Err(LlmError::Transient("boom".into()))
            }
            async fn complete_stream(
                &self,
                _r: ChatRequest,
            ) -> Result<futures::stream::BoxStream<'static, conclave_llm::StreamDelta>, LlmError> {
                Err(LlmError::Transient("boom".into()))
            }
        }

        let store = ConversationStore::new(temp_dir());
        let session = Uuid::new_v4();
        store.append(Message::user(session, "hi")).await.unwrap();
        let err = summarize(&Failing, &store, "gpt-4o", session, 1, 1500).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Llm(_)));
        assert_eq!(store.all(session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn summarize_all_picks_the_latest_non_summary_seq() {
        let store = ConversationStore::new(temp_dir());
        let session = Uuid::new_v4();
        for i in 0..3 {
            store.append(Message::user(session, format!("m{i}"))).await.unwrap();
        }
        let llm = scripted("all condensed");
        let summary = summarize_all(&llm, &store, "gpt-4o", session, 1500).await.unwrap();
        assert_eq!(summary, Some("all condensed".to_string()));
        assert_eq!(store.all(session).await.unwrap().len(), 1);
    }
}
