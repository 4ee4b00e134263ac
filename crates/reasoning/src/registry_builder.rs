//! Wires the built-in tool schemas (`conclave_tools::builtin_specs`) to thin
//! handlers over `conclave-agent`'s memory blocks and `conclave-memory`'s
//! archival store. `send_message` and `request_heartbeat` are not registered
//! here — the reasoning loop interprets those two directly, as documented on
//! `conclave_tools::builtins`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use conclave_agent::AgentStore;
use conclave_core::AgentId;
use conclave_memory::{Feedback, HierarchicalMemory, MemoryCategory, MemoryItem, MemoryTier, SourceTag};
use conclave_tools::{builtin_specs, ToolDefinition, ToolError, ToolRegistry};

pub fn build(
    agent_id: AgentId,
    session_id: Uuid,
    agents: Arc<AgentStore>,
    memory: Arc<HierarchicalMemory>,
    tool_timeout: Duration,
) -> ToolRegistry {
    let registry = ToolRegistry::new();

    for spec in builtin_specs() {
        match spec.name {
            "core_memory_append" => {
                let agents = agents.clone();
                registry.register(ToolDefinition::new(
                    spec.name,
                    spec.description,
                    spec.json_schema.clone(),
                    spec.side_effect_class,
                    tool_timeout,
                    Arc::new(move |args: Value| {
                        let agents = agents.clone();
                        async move {
                            let label = str_field(&args, "label")?;
                            let text = str_field(&args, "text")?;
                            let block = agents
                                .append_memory_block(agent_id, &label, &text)
                                .await
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            Ok(json!({ "label": block.label, "value": block.value }))
                        }
                    }),
                ));
            }
            "core_memory_replace" => {
                let agents = agents.clone();
                registry.register(ToolDefinition::new(
                    spec.name,
                    spec.description,
                    spec.json_schema.clone(),
                    spec.side_effect_class,
                    tool_timeout,
                    Arc::new(move |args: Value| {
                        let agents = agents.clone();
                        async move {
                            let label = str_field(&args, "label")?;
                            let old_text = str_field(&args, "old_text")?;
                            let new_text = str_field(&args, "new_text")?;
                            let block = agents
                                .get_memory_block(agent_id, &label)
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            if !block.value.contains(&old_text) {
                                return Err(ToolError::HandlerError(format!(
                                    "old_text not found in memory block '{label}'"
                                )));
                            }
                            let replaced = block.value.replacen(&old_text, &new_text, 1);
                            let updated = agents
                                .set_memory_block_value(agent_id, &label, replaced)
                                .await
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            Ok(json!({ "label": updated.label, "value": updated.value }))
                        }
                    }),
                ));
            }
            "archival_memory_insert" => {
                let memory = memory.clone();
                registry.register(ToolDefinition::new(
                    spec.name,
                    spec.description,
                    spec.json_schema.clone(),
                    spec.side_effect_class,
                    tool_timeout,
                    Arc::new(move |args: Value| {
                        let memory = memory.clone();
                        async move {
                            let content = str_field(&args, "content")?;
                            let importance = args
                                .get("importance")
                                .and_then(|v| v.as_f64())
                                .unwrap_or(5.0) as f32;
                            let category = args
                                .get("category")
                                .and_then(|v| v.as_str())
                                .map(parse_category)
                                .unwrap_or(MemoryCategory::Fact);
                            let item = MemoryItem::new(
                                agent_id.0,
                                MemoryTier::Episodic,
                                content,
                                importance,
                                category,
                                SourceTag::ToolResult,
                            );
                            let stored = memory
                                .store_item(item, session_id)
                                .await
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            Ok(json!({ "id": stored.id, "tier": stored.tier }))
                        }
                    }),
                ));
            }
            "archival_memory_search" => {
                let memory = memory.clone();
                registry.register(ToolDefinition::new(
                    spec.name,
                    spec.description,
                    spec.json_schema.clone(),
                    spec.side_effect_class,
                    tool_timeout,
                    Arc::new(move |args: Value| {
                        let memory = memory.clone();
                        async move {
                            let query = str_field(&args, "query")?;
                            let k = args.get("k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;
                            let hits = memory.search(agent_id.0, session_id, &query, None, k, None);
                            let results: Vec<Value> = hits
                                .iter()
                                .map(|h| {
                                    json!({
                                        "id": h.item.id,
                                        "tier": h.item.tier,
                                        "score": h.score,
                                        "content": h.item.content,
                                    })
                                })
                                .collect();
                            Ok(json!({ "results": results }))
                        }
                    }),
                ));
            }
            "record_feedback" => {
                let memory = memory.clone();
                registry.register(ToolDefinition::new(
                    spec.name,
                    spec.description,
                    spec.json_schema.clone(),
                    spec.side_effect_class,
                    tool_timeout,
                    Arc::new(move |args: Value| {
                        let memory = memory.clone();
                        async move {
                            let item_id_str = str_field(&args, "item_id")?;
                            let item_id: Uuid = item_id_str
                                .parse()
                                .map_err(|_| ToolError::HandlerError("invalid item_id".to_string()))?;
                            let feedback = args
                                .get("feedback")
                                .and_then(|v| v.as_str())
                                .map(parse_feedback)
                                .ok_or_else(|| ToolError::HandlerError("missing feedback".to_string()))?;

                            let mut item = memory
                                .store()
                                .get(item_id)
                                .ok_or_else(|| ToolError::HandlerError("memory item not found".to_string()))?;
                            item.importance = (item.importance + feedback.delta_importance()).clamp(0.0, 10.0);
                            memory
                                .store()
                                .put(item)
                                .await
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            memory
                                .graph()
                                .apply_feedback(item_id, feedback, Utc::now())
                                .await
                                .map_err(|e| ToolError::HandlerError(e.to_string()))?;
                            Ok(json!({ "ok": true }))
                        }
                    }),
                ));
            }
            _ => {}
        }
    }

    registry
}

fn str_field(args: &Value, name: &str) -> Result<String, ToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ToolError::HandlerError(format!("missing or non-string field '{name}'")))
}

fn parse_category(s: &str) -> MemoryCategory {
    match s {
        "preference" => MemoryCategory::Preference,
        "fact" => MemoryCategory::Fact,
        "event" => MemoryCategory::Event,
        "emotion" => MemoryCategory::Emotion,
        "insight" => MemoryCategory::Insight,
        "relationship_moment" => MemoryCategory::RelationshipMoment,
        _ => MemoryCategory::Fact,
    }
}

fn parse_feedback(s: &str) -> Feedback {
    match s {
        "helpful" => Feedback::Helpful,
        "not_helpful" => Feedback::NotHelpful,
        "incorrect" => Feedback::Incorrect,
        "outdated" => Feedback::Outdated,
        "redundant" => Feedback::Redundant,
        _ => Feedback::NotHelpful,
    }
}
