//! Integration tests over the HTTP surface, exercising the router the same
//! way `conclave-reasoning`'s `tests/turn_scenarios.rs` exercises the loop:
//! real (tempdir-backed) stores, a scripted model, `tower::ServiceExt::oneshot`
//! instead of a live listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use conclave_agent::{AgentConfig, AgentStore, MemoryBlock};
use conclave_core::config::{AppConfig, ContextConfig, HierarchyConfig, LearnerConfig, LoopConfig, RetentionConfig};
use conclave_conversation::ConversationStore;
use conclave_cost::CostTracker;
use conclave_llm::message::{ChatCompletion, ChatMessage, FinishReason, Usage};
use conclave_llm::ScriptedChatClient;
use conclave_memory::{AssociationGraph, HierarchicalMemory, MemoryStore};
use conclave_reasoning::ReasoningLoop;
use conclave_server::{build_router, AppState};

struct Harness {
    router: axum::Router,
    agents: Arc<AgentStore>,
    agent_id: conclave_core::AgentId,
}

async fn build_harness(llm: ScriptedChatClient) -> Harness {
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

    let llm: Arc<dyn conclave_llm::ChatClient> = Arc::new(llm);
    let reasoning = Arc::new(ReasoningLoop::new(
        llm.clone(),
        agents.clone(),
        conversations.clone(),
        memory.clone(),
        costs.clone(),
        LoopConfig::default(),
        ContextConfig::default(),
    ));

    let state = Arc::new(AppState::new(AppConfig::default(), agents.clone(), conversations, memory, costs, reasoning, llm));
    let router = build_router(state);

    Harness { router, agents, agent_id: agent.id }
}

fn plain_reply(text: &str) -> ChatCompletion {
    ChatCompletion {
        message: ChatMessage::assistant(text),
        thinking: None,
        usage: Usage { prompt_tokens: 120, completion_tokens: 40, reasoning_tokens: None },
        finish_reason: FinishReason::Stop,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let harness = build_harness(ScriptedChatClient::new(vec![plain_reply("unused")])).await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = harness.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

/// A full `POST /agents/{id}/chat` round trip: the reply lands in the
/// response body, and the turn's messages are visible afterwards via
/// `GET /conversation/{session}`.
#[tokio::test]
async fn chat_round_trip_persists_to_conversation_log() {
    let harness = build_harness(ScriptedChatClient::new(vec![plain_reply("Hello there!")])).await;
    let session_id = harness.agent_id.0;

    let chat_uri = format!("/agents/{}/chat", harness.agent_id.0);
    let request = json_request(Method::POST, &chat_uri, json!({ "message": "hi" }));
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["content"], "Hello there!");
    assert_eq!(body["is_error"], false);
    assert!(body["tool_calls"].as_array().map(|v| v.is_empty()).unwrap_or(true));

    let history_uri = format!("/conversation/{session_id}");
    let request = Request::builder().uri(&history_uri).body(Body::empty()).unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert!(messages.iter().any(|m| m["role"] == "user" && m["content"] == "hi"));
    assert!(messages.iter().any(|m| m["role"] == "assistant" && m["content"] == "Hello there!"));
}

/// `POST /agents/{id}/config` then `POST /agents/{id}/versions/{vid}/rollback`
/// (spec invariant 8): rollback restores prior content but mints a new,
/// distinct `version_id`.
#[tokio::test]
async fn config_rollback_restores_content_with_new_version_id() {
    let harness = build_harness(ScriptedChatClient::new(vec![plain_reply("unused")])).await;
    let original = harness.agents.get_current(harness.agent_id).unwrap();

    let patch_uri = format!("/agents/{}/config", harness.agent_id.0);
    let request = json_request(Method::PUT, &patch_uri, json!({ "temperature": 0.1, "description": "lower temp" }));
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = harness.agents.get_current(harness.agent_id).unwrap();
    assert_eq!(updated.temperature, 0.1);
    assert_ne!(updated.version_id.0, original.version_id.0);

    let rollback_uri = format!("/agents/{}/versions/{}/rollback", harness.agent_id.0, original.version_id.0);
    let request = Request::builder().method(Method::POST).uri(&rollback_uri).body(Body::empty()).unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["temperature"], original.temperature);
    assert_ne!(body["version_id"], json!(original.version_id.0));
    assert_ne!(body["version_id"], json!(updated.version_id.0));
}

/// `PUT /agents/{id}/memory/blocks/{label}` over `limit_chars` is rejected
/// (spec invariant 11) and leaves the block's value untouched.
#[tokio::test]
async fn memory_block_over_limit_is_rejected() {
    let harness = build_harness(ScriptedChatClient::new(vec![plain_reply("unused")])).await;
    harness
        .agents
        .add_memory_block(harness.agent_id, MemoryBlock::new("persona", "short", 10))
        .await
        .unwrap();

    let put_uri = format!("/agents/{}/memory/blocks/persona", harness.agent_id.0);
    let request = json_request(Method::PUT, &put_uri, json!({ "value": "this value is definitely too long" }));
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let block = harness.agents.get_memory_block(harness.agent_id, "persona").unwrap();
    assert_eq!(block.value, "short");
}

/// E4-equivalent over HTTP: a scripted model that always calls a tool with
/// no handler registered trips `ToolLimit`/a bounded step count rather than
/// looping forever, surfaced as a non-200 `is_error` turn rather than a
/// hang.
#[tokio::test]
async fn chat_with_unregistered_tool_call_terminates_as_error_turn() {
    let harness = build_harness(ScriptedChatClient::always_calls("no_such_tool")).await;

    let chat_uri = format!("/agents/{}/chat", harness.agent_id.0);
    let request = json_request(Method::POST, &chat_uri, json!({ "message": "do the thing" }));
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_error"], true);
}

#[tokio::test]
async fn unknown_agent_returns_not_found_mapped_error() {
    let harness = build_harness(ScriptedChatClient::new(vec![plain_reply("unused")])).await;
    let missing = uuid::Uuid::new_v4();
    let request = Request::builder().uri(format!("/agents/{missing}")).body(Body::empty()).unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "invalid_request");
}
