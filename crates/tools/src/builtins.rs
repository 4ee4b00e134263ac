//! Built-in tool families (spec §4.8): schemas only. Implementations live
//! outside this crate — `core_memory_*`/`archival_memory_*`/`record_feedback`
//! are wired against `conclave-memory` by the process that assembles the
//! reasoning loop (`conclave-server`/`conclave-cli`), and `send_message` /
//! `request_heartbeat` are interpreted directly by `conclave-reasoning`
//! rather than given a generic handler.

use serde_json::{json, Value};

use crate::registry::SideEffectClass;

/// Pure schema metadata for one built-in tool — no handler, since the
/// concrete implementation needs context (a specific agent's memory store,
/// conversation log) this leaf crate doesn't own.
#[derive(Debug, Clone)]
pub struct BuiltinToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub json_schema: Value,
    pub side_effect_class: SideEffectClass,
    pub terminal: bool,
}

/// Every built-in tool schema the core must support, in the order spec
/// §4.8 lists them.
pub fn builtin_specs() -> Vec<BuiltinToolSpec> {
    vec![
        BuiltinToolSpec {
            name: "core_memory_append",
            description: "Append text to the end of a named memory block's value.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "label": { "type": "string", "description": "memory block label, e.g. \"human\"" },
                    "text": { "type": "string", "description": "text to append" }
                },
                "required": ["label", "text"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Write,
            terminal: false,
        },
        BuiltinToolSpec {
            name: "core_memory_replace",
            description: "Replace an exact substring within a named memory block's value.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "old_text": { "type": "string" },
                    "new_text": { "type": "string" }
                },
                "required": ["label", "old_text", "new_text"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Write,
            terminal: false,
        },
        BuiltinToolSpec {
            name: "archival_memory_insert",
            description: "Insert a new memory item into long-term (episodic/semantic) storage.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "importance": { "type": "number", "minimum": 0, "maximum": 10 },
                    "category": {
                        "type": "string",
                        "enum": ["fact", "preference", "event", "emotion", "insight", "relationship_moment"]
                    }
                },
                "required": ["content"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Write,
            terminal: false,
        },
        BuiltinToolSpec {
            name: "archival_memory_search",
            description: "Search long-term memory for items relevant to a query.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "k": { "type": "integer", "minimum": 1, "maximum": 50 }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Read,
            terminal: false,
        },
        BuiltinToolSpec {
            name: "record_feedback",
            description: "Record a feedback signal against a specific memory item.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "item_id": { "type": "string", "format": "uuid" },
                    "feedback": {
                        "type": "string",
                        "enum": ["helpful", "not_helpful", "incorrect", "outdated", "redundant"]
                    }
                },
                "required": ["item_id", "feedback"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Write,
            terminal: false,
        },
        BuiltinToolSpec {
            name: "send_message",
            description: "Send the final reply to the user. Ends the current turn.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" }
                },
                "required": ["content"],
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::External,
            terminal: true,
        },
        BuiltinToolSpec {
            name: "request_heartbeat",
            description: "Keep the reasoning loop alive for one more step without ending the turn.",
            json_schema: json!({
                "type": "object",
                "properties": {
                    "reason": { "type": "string" }
                },
                "additionalProperties": false
            }),
            side_effect_class: SideEffectClass::Pure,
            terminal: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_terminal_tool() {
        let specs = builtin_specs();
        let terminal: Vec<_> = specs.iter().filter(|s| s.terminal).collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].name, "send_message");
    }

    #[test]
    fn every_schema_is_a_valid_json_schema() {
        for spec in builtin_specs() {
            jsonschema::validator_for(&spec.json_schema).unwrap_or_else(|e| panic!("{}: {e}", spec.name));
        }
    }

    #[test]
    fn schema_names_match_spec_list() {
        let names: Vec<&str> = builtin_specs().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "core_memory_append",
                "core_memory_replace",
                "archival_memory_insert",
                "archival_memory_search",
                "record_feedback",
                "send_message",
                "request_heartbeat",
            ]
        );
    }
}
