//! C7 — Context Assembler (spec §4.7): builds the final LLM input within a
//! token budget and emits a usage breakdown.
//!
//! Grounded on the teacher's `runtime::prompt_builder::build_chat_prompt`
//! (fixed header blocks followed by a budget-filled conversation slice) and
//! `MemoryManager::context_for_prompt_ranked` (priority tiers always
//! included, then budget-filled) — generalized here from one hand-formatted
//! string into the spec's explicit five-step, four-bucket algorithm.

use conclave_agent::{AgentConfig, MemoryBlock};
use conclave_conversation::{Message, MessageType, Role};
use conclave_llm::{ChatMessage, ToolSchema};
use conclave_memory::HierarchicalMemory;
use uuid::Uuid;

use crate::error::ContextError;

/// Token usage broken down into the four buckets spec §4.7/invariant 6
/// require: `total = system + memory_blocks + tool_schemas + conversation`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct UsageBreakdown {
    pub system: usize,
    pub memory_blocks: usize,
    pub tool_schemas: usize,
    pub conversation: usize,
    pub total: usize,
    pub max: usize,
    pub percent_used: f32,
    pub needs_summarization: bool,
    pub remaining: usize,
}

pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    pub usage: UsageBreakdown,
}

/// Everything the assembler needs for one turn, gathered by the caller
/// (`conclave-reasoning`) so this crate stays free of any HTTP/store
/// wiring concerns.
pub struct AssembleInput<'a> {
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub config: &'a AgentConfig,
    pub memory_blocks: &'a [MemoryBlock],
    pub tool_schemas: &'a [ToolSchema],
    pub history: &'a [Message],
    pub current_user_message: &'a str,
    pub memory_top_k: usize,
    pub summarization_threshold_pct: f32,
}

fn format_memory_blocks(blocks: &[MemoryBlock]) -> String {
    blocks
        .iter()
        .map(|b| format!("[{}]\n{}", b.label, b.value))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_tool_schemas(tools: &[ToolSchema]) -> String {
    tools
        .iter()
        .map(|t| format!("- {} :: {}", t.name, t.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_memory_context(memory: &HierarchicalMemory, input: &AssembleInput<'_>) -> String {
    let hits = memory.search(
        input.agent_id,
        input.session_id,
        input.current_user_message,
        None,
        input.memory_top_k,
        None,
    );
    if hits.is_empty() {
        return "(no relevant memories retrieved)".to_string();
    }
    hits.iter()
        .map(|h| format!("- [{:?}] score={:.2} :: {}", h.tier, h.score, h.item.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the five-step algorithm of spec §4.7 and produce the ordered message
/// list plus usage breakdown.
pub fn assemble(input: AssembleInput<'_>, memory: &HierarchicalMemory) -> Result<AssembledContext, ContextError> {
    let model = input.config.model.as_str();
    let max = input.config.context_window as usize;

    // Step 1: fixed cost.
    let system_text = input.config.system_prompt.clone();
    let memory_blocks_text = format_memory_blocks(input.memory_blocks);
    let tool_schemas_text = format_tool_schemas(input.tool_schemas);

    let system_tokens = conclave_token::count(&system_text, model);
    let memory_blocks_tokens = conclave_token::count(&memory_blocks_text, model);
    let tool_schemas_tokens = conclave_token::count(&tool_schemas_text, model);
    let fixed = system_tokens + memory_blocks_tokens + tool_schemas_tokens;

    let fixed_budget = (max as f64 * 0.9) as usize;
    if fixed > fixed_budget {
        return Err(ContextError::FixedCostExceeded { fixed, max });
    }

    // Step 2: retrieve top-k memories, format as a bounded block.
    let memory_context_text = format_memory_context(memory, &input);

    // Split the log into durable system summaries (produced by
    // `replace_prefix_with_summary`) and ordinary conversation messages.
    let (summaries, conversation): (Vec<&Message>, Vec<&Message>) = input
        .history
        .iter()
        .partition(|m| m.role == Role::System && m.message_type == MessageType::System);

    let summaries_text: String = summaries.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("\n\n");

    let current_user_tokens = conclave_token::count(input.current_user_message, model);

    // Step 3: fill the remaining budget with the conversation slice,
    // newest to oldest, stopping before the next message would overflow.
    let memory_block_tokens = conclave_token::count(&memory_context_text, model) + conclave_token::count(&summaries_text, model);
    let mut remaining_for_conversation = max
        .saturating_sub(fixed)
        .saturating_sub(memory_block_tokens)
        .saturating_sub(current_user_tokens);

    let mut included: Vec<&Message> = Vec::new();
    for message in conversation.iter().rev() {
        let cost = conclave_token::count(&message.content, model) + 4;
        if cost > remaining_for_conversation {
            break;
        }
        remaining_for_conversation -= cost;
        included.push(message);
    }
    included.reverse();

    let conversation_tokens: usize = included.iter().map(|m| conclave_token::count(&m.content, model) + 4).sum();
    let conversation_bucket = memory_block_tokens + conversation_tokens + current_user_tokens;

    let total = system_tokens + memory_blocks_tokens + tool_schemas_tokens + conversation_bucket;
    let percent_used = if max == 0 { 1.0 } else { total as f32 / max as f32 };
    let needs_summarization = percent_used >= input.summarization_threshold_pct;

    // Step 5: final ordering.
    let mut messages = Vec::new();
    if !system_text.is_empty() {
        messages.push(ChatMessage::system(system_text));
    }
    if !memory_blocks_text.is_empty() {
        messages.push(ChatMessage::system(format!("MEMORY BLOCKS:\n{memory_blocks_text}")));
    }
    if !tool_schemas_text.is_empty() {
        messages.push(ChatMessage::system(format!("AVAILABLE TOOLS:\n{tool_schemas_text}")));
    }
    messages.push(ChatMessage::system(format!("MEMORY CONTEXT:\n{memory_context_text}")));
    if !summaries_text.is_empty() {
        messages.push(ChatMessage::system(format!("EARLIER CONVERSATION SUMMARY:\n{summaries_text}")));
    }
    for message in &included {
        messages.push(to_chat_message(message));
    }
    messages.push(ChatMessage::user(input.current_user_message));

    Ok(AssembledContext {
        messages,
        usage: UsageBreakdown {
            system: system_tokens,
            memory_blocks: memory_blocks_tokens,
            tool_schemas: tool_schemas_tokens,
            conversation: conversation_bucket,
            total,
            max,
            percent_used,
            needs_summarization,
            remaining: max.saturating_sub(total),
        },
    })
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        Role::User => ChatMessage::user(message.content.clone()),
        Role::Assistant => ChatMessage::assistant(message.content.clone()),
        Role::System => ChatMessage::system(message.content.clone()),
        Role::Tool => {
            let call_id = message.tool_calls.first().map(|tc| tc.id.clone()).unwrap_or_default();
            ChatMessage::tool_result(call_id, message.content.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_agent::AgentConfig;
    use conclave_memory::{AssociationGraph, HierarchicalMemory, MemoryStore};
    use conclave_core::config::{HierarchyConfig, LearnerConfig, RetentionConfig};

    fn temp_dir(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("conclave-context-{label}-{}", Uuid::new_v4()))
    }

    fn memory() -> HierarchicalMemory {
        let store = MemoryStore::open(temp_dir("store")).unwrap();
        let graph = AssociationGraph::open(temp_dir("graph")).unwrap();
        HierarchicalMemory::new(store, graph, HierarchyConfig::default(), RetentionConfig::default(), LearnerConfig::default())
    }

    fn config(context_window: u32) -> AgentConfig {
        let mut c = AgentConfig::genesis("gpt-4o", "You are a helpful agent.");
        c.context_window = context_window;
        c
    }

    #[test]
    fn assembles_in_spec_order_with_no_history() {
        let mem = memory();
        let cfg = config(8000);
        let result = assemble(
            AssembleInput {
                agent_id: Uuid::new_v4(),
                session_id: Uuid::new_v4(),
                config: &cfg,
                memory_blocks: &[],
                tool_schemas: &[],
                history: &[],
                current_user_message: "Hello",
                memory_top_k: 5,
                summarization_threshold_pct: 0.8,
            },
            &mem,
        )
        .unwrap();

        assert_eq!(result.messages.first().unwrap().content.as_deref(), Some("You are a helpful agent."));
        assert_eq!(result.messages.last().unwrap().content.as_deref(), Some("Hello"));
        assert!(result.usage.total > 0);
        assert_eq!(
            result.usage.total,
            result.usage.system + result.usage.memory_blocks + result.usage.tool_schemas + result.usage.conversation
        );
    }

    #[test]
    fn fixed_cost_overflow_is_rejected_before_any_slicing() {
        let mem = memory();
        let mut cfg = config(100);
        cfg.system_prompt = "x".repeat(2000);
        let err = assemble(
            AssembleInput {
                agent_id: Uuid::new_v4(),
                session_id: Uuid::new_v4(),
                config: &cfg,
                memory_blocks: &[],
                tool_schemas: &[],
                history: &[],
                current_user_message: "hi",
                memory_top_k: 5,
                summarization_threshold_pct: 0.8,
            },
            &mem,
        )
        .unwrap_err();
        assert!(matches!(err, ContextError::FixedCostExceeded { .. }));
    }

    #[test]
    fn old_messages_are_dropped_before_recent_ones_under_budget_pressure() {
        let mem = memory();
        let cfg = config(160);
        let session = Uuid::new_v4();
        let history: Vec<Message> = (0..50)
            .map(|i| {
                let mut m = Message::user(session, format!("message number {i} with some padding text"));
                m.seq = i as u64 + 1;
                m
            })
            .collect();

        let result = assemble(
            AssembleInput {
                agent_id: Uuid::new_v4(),
                session_id: session,
                config: &cfg,
                memory_blocks: &[],
                tool_schemas: &[],
                history: &history,
                current_user_message: "what did I just say",
                memory_top_k: 5,
                summarization_threshold_pct: 0.8,
            },
            &mem,
        )
        .unwrap();

        // Must have dropped at least one of the oldest messages under this tiny budget.
        assert!(result.messages.len() < history.len() + 2);
        // Whatever survived must be in oldest-to-newest order.
        let contents: Vec<&str> = result
            .messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .filter(|c| c.starts_with("message number"))
            .collect();
        let mut sorted = contents.clone();
        sorted.sort_by_key(|c| {
            c.trim_start_matches("message number ")
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(0)
        });
        assert_eq!(contents, sorted);
    }

    #[test]
    fn needs_summarization_flips_past_threshold() {
        let mem = memory();
        let mut cfg = config(200);
        cfg.system_prompt = "x".repeat(300);
        let result = assemble(
            AssembleInput {
                agent_id: Uuid::new_v4(),
                session_id: Uuid::new_v4(),
                config: &cfg,
                memory_blocks: &[],
                tool_schemas: &[],
                history: &[],
                current_user_message: "hi",
                memory_top_k: 5,
                summarization_threshold_pct: 0.1,
            },
            &mem,
        )
        .unwrap();
        assert!(result.usage.needs_summarization);
    }
}
