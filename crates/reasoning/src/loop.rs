//! C9 — the turn-taking reasoning loop (spec §4.9):
//! `ASSEMBLE → CALL_LLM → INSPECT → [TOOL_DISPATCH → APPEND_TOOL_RESULTS →
//! CALL_LLM]* → PERSIST → DONE`, bounded on four independent axes (steps,
//! tool calls, wall time, cost) and serialized per session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use conclave_agent::AgentStore;
use conclave_context::{AssembleInput, UsageBreakdown};
use conclave_conversation::{ConversationStore, ErrorReason, Message, MessageType, Role, ToolCall as ConvToolCall};
use conclave_core::config::{ContextConfig, LoopConfig};
use conclave_core::AgentId;
use conclave_cost::{CostTracker, PricingTable, UsageRecord};
use conclave_llm::{ChatClient, ChatMessage, ChatRequest, LlmError, ToolSchema};
use conclave_memory::HierarchicalMemory;
use conclave_tools::DispatchStatus;

use crate::error::{default_error_text, ReasoningError};
use crate::registry_builder;

/// What a turn produced, whether it finished cleanly or was cut off by one
/// of the bounds in spec §4.9.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: String,
    pub is_error: bool,
    pub usage: UsageBreakdown,
    pub steps: usize,
    pub tool_calls: usize,
    pub wall_time_ms: u64,
}

pub struct ReasoningLoop {
    llm: Arc<dyn ChatClient>,
    agents: Arc<AgentStore>,
    conversations: Arc<ConversationStore>,
    memory: Arc<HierarchicalMemory>,
    costs: Arc<CostTracker>,
    pricing: PricingTable,
    loop_cfg: LoopConfig,
    context_cfg: ContextConfig,
    session_locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
    turn_counts: DashMap<AgentId, AtomicU64>,
}

impl ReasoningLoop {
    pub fn new(
        llm: Arc<dyn ChatClient>,
        agents: Arc<AgentStore>,
        conversations: Arc<ConversationStore>,
        memory: Arc<HierarchicalMemory>,
        costs: Arc<CostTracker>,
        loop_cfg: LoopConfig,
        context_cfg: ContextConfig,
    ) -> Self {
        Self {
            llm,
            agents,
            conversations,
            memory,
            costs,
            pricing: PricingTable::default(),
            loop_cfg,
            context_cfg,
            session_locks: DashMap::new(),
            turn_counts: DashMap::new(),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    fn session_lock(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.session_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn next_turn_number(&self, agent_id: AgentId) -> u64 {
        let counter = self
            .turn_counts
            .entry(agent_id)
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn persist_error_turn(
        &self,
        session_id: Uuid,
        reason: ErrorReason,
        start: Instant,
    ) -> Result<TurnOutcome, ReasoningError> {
        let message = Message::assistant_error(session_id, reason, default_error_text(reason));
        self.conversations
            .append(message)
            .await
            .map_err(|e| ReasoningError::Storage(e.to_string()))?;
        Ok(TurnOutcome {
            content: String::new(),
            is_error: true,
            usage: UsageBreakdown::default(),
            steps: 0,
            tool_calls: 0,
            wall_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Runs one full turn for `agent_id` within `session_id`. Only one turn
    /// per session runs at a time; concurrent calls queue behind the
    /// session's lock rather than interleaving.
    pub async fn run_turn(
        &self,
        agent_id: AgentId,
        session_id: Uuid,
        user_text: impl Into<String>,
    ) -> Result<TurnOutcome, ReasoningError> {
        let user_text = user_text.into();
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let start = Instant::now();
        let deadline = start + Duration::from_secs(self.loop_cfg.max_wall_time_secs);

        let user_seq = self
            .conversations
            .append(Message::user(session_id, user_text.clone()))
            .await
            .map_err(|e| ReasoningError::Storage(e.to_string()))?;

        let config = self.agents.get_current(agent_id)?;
        let memory_blocks = self.agents.list_memory_blocks(agent_id)?;

        let tool_specs = conclave_tools::builtin_specs();
        let tool_schemas: Vec<ToolSchema> = tool_specs
            .iter()
            .map(|s| ToolSchema {
                name: s.name.to_string(),
                description: s.description.to_string(),
                parameters: s.json_schema.clone(),
            })
            .collect();

        let registry = registry_builder::build(
            agent_id,
            session_id,
            self.agents.clone(),
            self.memory.clone(),
            Duration::from_secs(self.loop_cfg.tool_timeout_secs),
        );

        let all_history = self
            .conversations
            .all(session_id)
            .await
            .map_err(|e| ReasoningError::Storage(e.to_string()))?;
        let mut history: Vec<Message> = all_history.into_iter().filter(|m| m.seq < user_seq).collect();

        let mut assembled = match conclave_context::assemble(
            AssembleInput {
                agent_id: agent_id.0,
                session_id,
                config: &config,
                memory_blocks: &memory_blocks,
                tool_schemas: &tool_schemas,
                history: &history,
                current_user_message: &user_text,
                memory_top_k: self.context_cfg.memory_top_k,
                summarization_threshold_pct: self.context_cfg.summarization_threshold_pct,
            },
            &self.memory,
        ) {
            Ok(a) => a,
            Err(_) => return self.persist_error_turn(session_id, ErrorReason::ContextOverflowFixed, start).await,
        };

        if assembled.usage.needs_summarization && self.context_cfg.auto_summarize {
            if let Some(up_to_seq) = history.iter().map(|m| m.seq).max() {
                match conclave_summarizer::summarize(
                    self.llm.as_ref(),
                    self.conversations.as_ref(),
                    &config.model,
                    session_id,
                    up_to_seq,
                    self.context_cfg.summary_target_tokens,
                )
                .await
                {
                    Ok(_) => {
                        let refreshed = self
                            .conversations
                            .all(session_id)
                            .await
                            .map_err(|e| ReasoningError::Storage(e.to_string()))?;
                        history = refreshed.into_iter().filter(|m| m.seq < user_seq).collect();
                        assembled = conclave_context::assemble(
                            AssembleInput {
                                agent_id: agent_id.0,
                                session_id,
                                config: &config,
                                memory_blocks: &memory_blocks,
                                tool_schemas: &tool_schemas,
                                history: &history,
                                current_user_message: &user_text,
                                memory_top_k: self.context_cfg.memory_top_k,
                                summarization_threshold_pct: self.context_cfg.summarization_threshold_pct,
                            },
                            &self.memory,
                        )?;
                    }
                    Err(err) => {
                        tracing::warn!(session = %session_id, error = %err, "auto-summarization failed, continuing with unsummarized context");
                    }
                }
            }
        }

        let mut messages = assembled.messages;
        let usage_breakdown = assembled.usage;

        let mut steps = 0usize;
        let mut tool_calls_made = 0usize;
        let mut running_cost = 0.0f64;
        let mut prompt_tokens_total = 0u64;
        let mut completion_tokens_total = 0u64;
        let mut reasoning_tokens_total = 0u64;

        let (content, is_error, error_reason) = 'turn: loop {
            if steps >= self.loop_cfg.max_steps {
                break 'turn (String::new(), true, Some(ErrorReason::StepLimit));
            }
            if tool_calls_made >= self.loop_cfg.max_tool_calls {
                break 'turn (String::new(), true, Some(ErrorReason::ToolLimit));
            }
            if Instant::now() >= deadline {
                break 'turn (String::new(), true, Some(ErrorReason::Timeout));
            }
            if running_cost >= self.loop_cfg.max_cost_usd {
                break 'turn (String::new(), true, Some(ErrorReason::BudgetExceeded));
            }

            steps += 1;

            let request = ChatRequest {
                model: config.model.clone(),
                messages: messages.clone(),
                tools: tool_schemas.clone(),
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_tokens,
                reasoning_enabled: config.reasoning_enabled.unwrap_or(false),
                max_reasoning_tokens: config.max_reasoning_tokens,
            };

            let completion = match call_llm(self.llm.as_ref(), request, &self.loop_cfg).await {
                Ok(c) => c,
                Err(err) => {
                    tracing::warn!(session = %session_id, error = %err, "llm call failed, ending turn");
                    break 'turn (String::new(), true, Some(ErrorReason::ProviderPermanent));
                }
            };

            prompt_tokens_total += completion.usage.prompt_tokens;
            completion_tokens_total += completion.usage.completion_tokens;
            reasoning_tokens_total += completion.usage.reasoning_tokens.unwrap_or(0);
            running_cost += self.pricing.estimate(
                &config.model,
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
            );

            if completion.message.tool_calls.is_empty() {
                break 'turn (completion.message.content.unwrap_or_default(), false, None);
            }

            messages.push(ChatMessage::assistant_tool_calls(completion.message.tool_calls.clone()));

            // Persisted record of this round's tool calls (spec invariant 2:
            // every assistant message with non-empty tool_calls is followed,
            // in seq order, by one tool message per call id).
            let mut persisted_calls: Vec<ConvToolCall> = Vec::new();
            let mut tool_result_messages: Vec<Message> = Vec::new();
            let mut terminal_reply: Option<String> = None;

            for call in completion.message.tool_calls {
                if tool_calls_made >= self.loop_cfg.max_tool_calls {
                    break;
                }
                tool_calls_made += 1;
                let call_start = Instant::now();

                if call.name == "send_message" {
                    let content = call
                        .arguments
                        .get("content")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let result = serde_json::json!({"ok": true});
                    messages.push(ChatMessage::tool_result(call.id.clone(), result.to_string()));
                    persisted_calls.push(ConvToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result: Some(result.clone()),
                        error: None,
                        duration_ms: Some(call_start.elapsed().as_millis() as u64),
                    });
                    tool_result_messages.push(Message::tool_result(session_id, &call.id, result));
                    terminal_reply = Some(content);
                    break;
                }

                if call.name == "request_heartbeat" {
                    let result = serde_json::json!({"ok": true});
                    messages.push(ChatMessage::tool_result(call.id.clone(), result.to_string()));
                    persisted_calls.push(ConvToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result: Some(result.clone()),
                        error: None,
                        duration_ms: Some(call_start.elapsed().as_millis() as u64),
                    });
                    tool_result_messages.push(Message::tool_result(session_id, &call.id, result));
                    continue;
                }

                let outcome = conclave_tools::dispatch(&registry, &call.name, call.arguments.clone()).await;
                let error_text = outcome.error.as_ref().map(|e| e.to_string());
                let result_value = match outcome.status {
                    DispatchStatus::Ok => outcome.result.clone().unwrap_or(serde_json::Value::Null),
                    _ => serde_json::json!({ "error": error_text.clone().unwrap_or_default() }),
                };
                messages.push(ChatMessage::tool_result(call.id.clone(), result_value.to_string()));
                persisted_calls.push(ConvToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: if outcome.status == DispatchStatus::Ok { Some(result_value.clone()) } else { None },
                    error: error_text,
                    duration_ms: Some(outcome.duration_ms),
                });
                tool_result_messages.push(Message::tool_result(session_id, &call.id, result_value));
            }

            if !persisted_calls.is_empty() {
                let assistant_tool_msg = Message {
                    session_id,
                    seq: 0,
                    role: Role::Assistant,
                    content: String::new(),
                    message_type: MessageType::Inbox,
                    tool_calls: persisted_calls,
                    thinking: None,
                    reasoning_time_ms: None,
                    error_reason: None,
                    created_at: Utc::now(),
                };
                self.conversations
                    .append(assistant_tool_msg)
                    .await
                    .map_err(|e| ReasoningError::Storage(e.to_string()))?;
                for tool_msg in tool_result_messages {
                    self.conversations
                        .append(tool_msg)
                        .await
                        .map_err(|e| ReasoningError::Storage(e.to_string()))?;
                }
            }

            if let Some(content) = terminal_reply {
                break 'turn (content, false, None);
            }
            if tool_calls_made >= self.loop_cfg.max_tool_calls {
                break 'turn (String::new(), true, Some(ErrorReason::ToolLimit));
            }
        };

        let final_message = if let Some(reason) = error_reason {
            Message::assistant_error(session_id, reason, default_error_text(reason))
        } else {
            Message::assistant(session_id, content.clone())
        };
        self.conversations
            .append(final_message)
            .await
            .map_err(|e| ReasoningError::Storage(e.to_string()))?;

        let usage_record = UsageRecord {
            timestamp: Utc::now(),
            session_id,
            model: config.model.clone(),
            prompt_tokens: prompt_tokens_total,
            completion_tokens: completion_tokens_total,
            reasoning_tokens: if reasoning_tokens_total > 0 { Some(reasoning_tokens_total) } else { None },
            cost: running_cost,
            tool_calls_made,
        };
        self.costs
            .record(usage_record)
            .await
            .map_err(|e| ReasoningError::Storage(e.to_string()))?;

        let turn_number = self.next_turn_number(agent_id);
        let now = Utc::now();
        if let Err(err) = self.memory.consolidate(agent_id.0, turn_number, now).await {
            tracing::warn!(agent = %agent_id, error = %err, "memory consolidation failed");
        }

        let referenced = self
            .memory
            .search(agent_id.0, session_id, &user_text, None, self.context_cfg.memory_top_k, None);
        let ids: Vec<Uuid> = referenced.iter().map(|r| r.item.id).collect();
        if ids.len() > 1 {
            if let Err(err) = self.memory.reinforce_co_access(&ids, now).await {
                tracing::warn!(agent = %agent_id, error = %err, "co-access reinforcement failed");
            }
        }

        Ok(TurnOutcome {
            content,
            is_error,
            usage: usage_breakdown,
            steps,
            tool_calls: tool_calls_made,
            wall_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn call_llm(
    llm: &dyn ChatClient,
    request: ChatRequest,
    cfg: &LoopConfig,
) -> Result<conclave_llm::ChatCompletion, LlmError> {
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::time::timeout(
            Duration::from_secs(cfg.llm_call_timeout_secs),
            llm.complete(request.clone()),
        )
        .await;

        let result = match outcome {
            Ok(inner) => inner,
            Err(_) => Err(LlmError::Transient("llm call timed out".to_string())),
        };

        match result {
            Ok(completion) => return Ok(completion),
            Err(err @ LlmError::Transient(_)) if attempt < cfg.max_retries => {
                attempt += 1;
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt.min(5)));
                tracing::debug!(attempt, error = %err, "retrying llm call after backoff");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
