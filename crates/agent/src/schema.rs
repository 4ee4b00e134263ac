//! Data model for agent identity, versioned configuration, and memory
//! blocks (spec §3: `Agent`, `AgentConfig`, `MemoryBlock`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use conclave_core::{AgentId, VersionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    pub value: String,
    pub limit_chars: usize,
    pub description: String,
    pub read_only: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl MemoryBlock {
    pub fn new(label: impl Into<String>, value: impl Into<String>, limit_chars: usize) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            limit_chars,
            description: String::new(),
            read_only: false,
            metadata: serde_json::Value::Null,
        }
    }

    /// Invariant: `len(value) <= limit_chars` (spec §3). Returns `false`
    /// without mutating when `read_only` or over the limit.
    pub fn try_set_value(&mut self, value: String) -> bool {
        if self.read_only || value.chars().count() > self.limit_chars {
            return false;
        }
        self.value = value;
        true
    }

    pub fn try_append(&mut self, text: &str) -> bool {
        if self.read_only {
            return false;
        }
        let candidate = format!("{}{}", self.value, text);
        if candidate.chars().count() > self.limit_chars {
            return false;
        }
        self.value = candidate;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub version_id: VersionId,
    pub parent_version: Option<VersionId>,
    pub timestamp: DateTime<Utc>,
    pub change_description: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub context_window: u32,
    #[serde(default)]
    pub reasoning_enabled: Option<bool>,
    #[serde(default)]
    pub max_reasoning_tokens: Option<u32>,
    pub system_prompt: String,
}

impl AgentConfig {
    pub fn genesis(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            version_id: VersionId::new(),
            parent_version: None,
            timestamp: Utc::now(),
            change_description: "initial configuration".to_string(),
            model: model.into(),
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: None,
            context_window: 128_000,
            reasoning_enabled: None,
            max_reasoning_tokens: None,
            system_prompt: system_prompt.into(),
        }
    }

    /// Content equality ignoring `version_id`/`parent_version`/`timestamp`
    /// (spec invariant 8's rollback round-trip check).
    pub fn content_eq(&self, other: &AgentConfig) -> bool {
        self.change_description == other.change_description
            && self.model == other.model
            && self.temperature == other.temperature
            && self.top_p == other.top_p
            && self.max_tokens == other.max_tokens
            && self.context_window == other.context_window
            && self.reasoning_enabled == other.reasoning_enabled
            && self.max_reasoning_tokens == other.max_reasoning_tokens
            && self.system_prompt == other.system_prompt
    }
}

/// A patch applied by `update` — every field is optional; only `Some`
/// fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfigPatch {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<Option<u32>>,
    pub context_window: Option<u32>,
    pub reasoning_enabled: Option<Option<bool>>,
    pub max_reasoning_tokens: Option<Option<u32>>,
    pub system_prompt: Option<String>,
}

impl AgentConfigPatch {
    pub fn apply(&self, base: &AgentConfig, new_version: VersionId, description: impl Into<String>) -> AgentConfig {
        AgentConfig {
            version_id: new_version,
            parent_version: Some(base.version_id),
            timestamp: Utc::now(),
            change_description: description.into(),
            model: self.model.clone().unwrap_or_else(|| base.model.clone()),
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            context_window: self.context_window.unwrap_or(base.context_window),
            reasoning_enabled: self.reasoning_enabled.unwrap_or(base.reasoning_enabled),
            max_reasoning_tokens: self.max_reasoning_tokens.unwrap_or(base.max_reasoning_tokens),
            system_prompt: self.system_prompt.clone().unwrap_or_else(|| base.system_prompt.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_version: VersionId,
    pub memory_blocks: HashMap<String, MemoryBlock>,
}

impl Agent {
    pub fn new(display_name: impl Into<String>, genesis_config: &AgentConfig) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            display_name: display_name.into(),
            description: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
            current_version: genesis_config.version_id,
            memory_blocks: HashMap::new(),
        }
    }
}
