//! Integration tests over the full turn-taking loop, exercising spec §8's
//! example scenarios end to end against real (tempdir-backed) stores and a
//! scripted model.

use std::sync::Arc;

use conclave_agent::{AgentConfig, AgentStore, MemoryBlock};
use conclave_core::config::{ContextConfig, HierarchyConfig, LearnerConfig, LoopConfig, RetentionConfig};
use conclave_cost::CostTracker;
use conclave_conversation::ConversationStore;
use conclave_llm::message::{ChatCompletion, ChatMessage, FinishReason, Usage};
use conclave_llm::ScriptedChatClient;
use conclave_memory::{AssociationGraph, HierarchicalMemory, MemoryStore};
use conclave_reasoning::ReasoningLoop;

async fn build_loop(
    llm: ScriptedChatClient,
) -> (ReasoningLoop, Arc<AgentStore>, conclave_core::AgentId, uuid::Uuid) {
    let dir = tempfile::tempdir().unwrap();

    let agents = Arc::new(AgentStore::new(dir.path().join("agents")).unwrap());
    let conversations = Arc::new(ConversationStore::new(dir.path().join("conversations")));
    let store = MemoryStore::open(dir.path().join("memory")).unwrap();
    let graph = AssociationGraph::open(dir.path().join("graph")).unwrap();
    let memory = Arc::new(HierarchicalMemory::new(
        store,
        graph,
        HierarchyConfig::default(),
        RetentionConfig::default(),
        LearnerConfig::default(),
    ));
    let costs = Arc::new(CostTracker::open(dir.path().join("cost")).unwrap());

    let genesis = AgentConfig::genesis("gpt-4o-mini", "You are a helpful assistant.");
    let agent = agents.create("test-agent", genesis).await.unwrap();
    agents
        .add_memory_block(agent.id, MemoryBlock::new("human", "", 2000))
        .await
        .unwrap();

    let reasoning = ReasoningLoop::new(
        Arc::new(llm),
        agents.clone(),
        conversations,
        memory,
        costs,
        LoopConfig::default(),
        ContextConfig::default(),
    );

    (reasoning, agents, agent.id, uuid::Uuid::new_v4())
}

fn plain_reply(text: &str) -> ChatCompletion {
    ChatCompletion {
        message: ChatMessage::assistant(text),
        thinking: None,
        usage: Usage { prompt_tokens: 120, completion_tokens: 40, reasoning_tokens: None },
        finish_reason: FinishReason::Stop,
    }
}

/// E1 — a simple turn: the model replies directly, no tool calls.
#[tokio::test]
async fn simple_turn_returns_assistant_reply() {
    let (reasoning, _agents, agent_id, session_id) =
        build_loop(ScriptedChatClient::new(vec![plain_reply("Hello there!")])).await;

    let outcome = reasoning
        .run_turn(agent_id, session_id, "hi")
        .await
        .expect("turn should succeed");

    assert!(!outcome.is_error);
    assert_eq!(outcome.content, "Hello there!");
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.tool_calls, 0);
}

/// E2 — a turn that writes to core memory via a tool call before replying.
#[tokio::test]
async fn tool_call_appends_to_memory_block_then_replies() {
    use conclave_llm::message::ToolCallRequest;

    let append_call = ChatCompletion {
        message: ChatMessage::assistant_tool_calls(vec![ToolCallRequest {
            id: "call_1".to_string(),
            name: "core_memory_append".to_string(),
            arguments: serde_json::json!({ "label": "human", "text": "likes hiking" }),
        }]),
        thinking: None,
        usage: Usage { prompt_tokens: 100, completion_tokens: 20, reasoning_tokens: None },
        finish_reason: FinishReason::ToolCalls,
    };

    let (reasoning, agents, agent_id, session_id) =
        build_loop(ScriptedChatClient::new(vec![append_call, plain_reply("Noted!")])).await;

    let outcome = reasoning
        .run_turn(agent_id, session_id, "I like hiking")
        .await
        .expect("turn should succeed");

    assert!(!outcome.is_error);
    assert_eq!(outcome.content, "Noted!");
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(outcome.steps, 2);

    let block = agents.get_memory_block(agent_id, "human").unwrap();
    assert!(block.value.contains("likes hiking"));
}

/// E4 — a scripted model that always requests a heartbeat never produces a
/// terminal reply, so the turn must end on the step bound rather than spin
/// forever.
#[tokio::test]
async fn runaway_heartbeat_loop_ends_on_step_limit() {
    let (reasoning, _agents, agent_id, session_id) =
        build_loop(ScriptedChatClient::always_calls("request_heartbeat")).await;

    let outcome = reasoning
        .run_turn(agent_id, session_id, "keep going")
        .await
        .expect("turn should end gracefully, not error out");

    assert!(outcome.is_error);
    assert_eq!(outcome.steps, conclave_core::config::LoopConfig::default().max_steps);
}
