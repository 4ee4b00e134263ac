//! C11 — Agent Config & Version Store (spec §4.11).
//!
//! Agents and their version chains are each one JSONL event log, the same
//! append/load/overwrite machinery as `conclave_memory::store::MemoryStore`
//! and `conclave_conversation::store::ConversationStore` — grounded on
//! `aigent-config::AppConfig::load_from`'s "TOML file with `Default` per
//! section" pattern, generalized from one global file to a per-agent
//! append-only chain since the spec requires immutable version history
//! rather than an overwritten config file.
//!
//! `config_changed` is a `tokio::sync::broadcast::Sender`, the same fan-out
//! primitive the teacher's `runtime/server.rs` uses for `BackendEvent`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use conclave_core::{AgentId, EventLog, VersionId};

use crate::error::AgentError;
use crate::schema::{Agent, AgentConfig, AgentConfigPatch, MemoryBlock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentRecord {
    agent: Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionRecord {
    config: AgentConfig,
}

/// Broadcast on every successful `update`/`rollback` (spec §4.11:
/// "the core exposes only an event `config_changed(agent, new_version)`").
#[derive(Debug, Clone)]
pub struct ConfigChanged {
    pub agent_id: AgentId,
    pub new_version: VersionId,
}

struct AgentState {
    agent: Agent,
    agent_log: EventLog<AgentRecord>,
    versions: Vec<AgentConfig>,
    version_log: EventLog<VersionRecord>,
}

pub struct AgentStore {
    data_dir: PathBuf,
    agents: DashMap<AgentId, Mutex<AgentState>>,
    config_changed: broadcast::Sender<ConfigChanged>,
}

impl AgentStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(data_dir.join("agents"))
            .with_context(|| format!("creating agents dir under {}", data_dir.display()))?;

        let (tx, _rx) = broadcast::channel(256);
        let store = Self {
            data_dir,
            agents: DashMap::new(),
            config_changed: tx,
        };

        for entry in std::fs::read_dir(store.data_dir.join("agents"))? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("jsonl")
                && entry
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".agent.jsonl"))
            {
                let stem = entry.path().file_name().unwrap().to_string_lossy().to_string();
                let id_str = stem.trim_end_matches(".agent.jsonl").to_string();
                if let Ok(uuid) = id_str.parse::<uuid::Uuid>() {
                    store.load_agent(AgentId(uuid))?;
                }
            }
        }

        Ok(store)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChanged> {
        self.config_changed.subscribe()
    }

    fn agent_log_path(&self, id: AgentId) -> PathBuf {
        self.data_dir.join("agents").join(format!("{id}.agent.jsonl"))
    }

    fn version_log_path(&self, id: AgentId) -> PathBuf {
        self.data_dir.join("agents").join(format!("{id}.versions.jsonl"))
    }

    fn load_agent(&self, id: AgentId) -> Result<()> {
        if self.agents.contains_key(&id) {
            return Ok(());
        }
        let agent_log: EventLog<AgentRecord> = EventLog::new(self.agent_log_path(id));
        let agent = agent_log
            .load()?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no agent record for {id}"))?
            .agent;
        let version_log: EventLog<VersionRecord> = EventLog::new(self.version_log_path(id));
        let versions = version_log.load()?.into_iter().map(|r| r.config).collect();
        self.agents.insert(
            id,
            Mutex::new(AgentState { agent, agent_log, versions, version_log }),
        );
        Ok(())
    }

    /// Create a new agent with a genesis configuration. Not part of spec §4.11's
    /// named operations but required to populate the store in the first place.
    pub async fn create(&self, display_name: impl Into<String>, genesis: AgentConfig) -> Result<Agent> {
        let agent = Agent::new(display_name, &genesis);
        let id = agent.id;

        let agent_log: EventLog<AgentRecord> = EventLog::new(self.agent_log_path(id));
        agent_log.append(&AgentRecord { agent: agent.clone() }).await?;

        let version_log: EventLog<VersionRecord> = EventLog::new(self.version_log_path(id));
        version_log.append(&VersionRecord { config: genesis.clone() }).await?;

        self.agents.insert(
            id,
            Mutex::new(AgentState {
                agent: agent.clone(),
                agent_log,
                versions: vec![genesis],
                version_log,
            }),
        );
        Ok(agent)
    }

    pub fn get(&self, id: AgentId) -> Result<Agent, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        Ok(entry.lock().unwrap().agent.clone())
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.iter().map(|e| e.value().lock().unwrap().agent.clone()).collect()
    }

    /// `get_current(agent)` — the config at the agent's `current_version` pointer.
    pub fn get_current(&self, id: AgentId) -> Result<AgentConfig, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        let state = entry.lock().unwrap();
        state
            .versions
            .iter()
            .find(|v| v.version_id == state.agent.current_version)
            .cloned()
            .ok_or(AgentError::VersionNotFound(state.agent.current_version, id))
    }

    pub fn list_versions(&self, id: AgentId, limit: usize) -> Result<Vec<AgentConfig>, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        let state = entry.lock().unwrap();
        let mut versions = state.versions.clone();
        versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        versions.truncate(limit.max(1));
        Ok(versions)
    }

    /// `update(agent, patch, description) -> new_version` (spec §4.11):
    /// appends a new immutable version whose parent is the current one and
    /// repoints the agent's `current_version`. Two identical consecutive
    /// updates create two distinct versions (spec invariant 9) since each
    /// call always allocates a fresh `VersionId`.
    pub async fn update(&self, id: AgentId, patch: AgentConfigPatch, description: impl Into<String>) -> Result<AgentConfig, AgentError> {
        let (new_config, agent_snapshot, version_log, agent_log) = {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let mut state = entry.lock().unwrap();
            let base = state
                .versions
                .iter()
                .find(|v| v.version_id == state.agent.current_version)
                .cloned()
                .ok_or(AgentError::VersionNotFound(state.agent.current_version, id))?;

            let new_config = patch.apply(&base, VersionId::new(), description);
            state.versions.push(new_config.clone());
            state.agent.current_version = new_config.version_id;
            state.agent.updated_at = Utc::now();

            (new_config, state.agent.clone(), state.version_log.clone(), state.agent_log.clone())
        };

        version_log
            .append(&VersionRecord { config: new_config.clone() })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        agent_log
            .append(&AgentRecord { agent: agent_snapshot })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;

        let _ = self.config_changed.send(ConfigChanged { agent_id: id, new_version: new_config.version_id });
        Ok(new_config)
    }

    /// `rollback(agent, version_id) -> new_version_pointing_to_that_state`
    /// (spec §4.11): never mutates history — creates a new version whose
    /// content equals the target's and whose `parent_version` is the target
    /// (spec invariant 8).
    pub async fn rollback(&self, id: AgentId, target_version: VersionId) -> Result<AgentConfig, AgentError> {
        let (target, agent_log, version_log) = {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let state = entry.lock().unwrap();
            let target = state
                .versions
                .iter()
                .find(|v| v.version_id == target_version)
                .cloned()
                .ok_or(AgentError::VersionNotFound(target_version, id))?;
            (target, state.agent_log.clone(), state.version_log.clone())
        };

        let new_version_id = VersionId::new();
        let rolled_back = AgentConfig {
            version_id: new_version_id,
            parent_version: Some(target_version),
            timestamp: Utc::now(),
            change_description: format!("rollback to version {target_version}"),
            ..target
        };

        {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let mut state = entry.lock().unwrap();
            state.versions.push(rolled_back.clone());
            state.agent.current_version = new_version_id;
            state.agent.updated_at = Utc::now();
        }

        version_log
            .append(&VersionRecord { config: rolled_back.clone() })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        let agent_snapshot = self.get(id)?;
        agent_log
            .append(&AgentRecord { agent: agent_snapshot })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;

        let _ = self.config_changed.send(ConfigChanged { agent_id: id, new_version: new_version_id });
        Ok(rolled_back)
    }

    /// Invariant 3: the version chain walked via `parent_version` from any
    /// version must terminate without revisiting a node.
    pub fn version_chain_is_acyclic(&self, id: AgentId) -> Result<bool, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        let state = entry.lock().unwrap();
        let by_id: HashMap<VersionId, &AgentConfig> = state.versions.iter().map(|v| (v.version_id, v)).collect();
        for start in &state.versions {
            let mut seen = std::collections::HashSet::new();
            let mut cursor = Some(start.version_id);
            while let Some(v) = cursor {
                if !seen.insert(v) {
                    return Ok(false);
                }
                cursor = by_id.get(&v).and_then(|c| c.parent_version);
            }
        }
        Ok(true)
    }

    // ---- memory blocks (agent identity, spec §3 MemoryBlock) ----

    pub fn list_memory_blocks(&self, id: AgentId) -> Result<Vec<MemoryBlock>, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        Ok(entry.lock().unwrap().agent.memory_blocks.values().cloned().collect())
    }

    pub fn get_memory_block(&self, id: AgentId, label: &str) -> Result<MemoryBlock, AgentError> {
        let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
        entry
            .lock()
            .unwrap()
            .agent
            .memory_blocks
            .get(label)
            .cloned()
            .ok_or_else(|| AgentError::BlockNotFound(label.to_string()))
    }

    /// `PUT /agents/{id}/memory/blocks/{label}` (spec §6): rejected if
    /// `read_only` or over `limit_chars` (spec invariant 11), leaving the
    /// block unchanged.
    pub async fn set_memory_block_value(&self, id: AgentId, label: &str, value: String) -> Result<MemoryBlock, AgentError> {
        let (updated, agent_snapshot, agent_log) = {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let mut state = entry.lock().unwrap();
            let block = state
                .agent
                .memory_blocks
                .get_mut(label)
                .ok_or_else(|| AgentError::BlockNotFound(label.to_string()))?;
            if block.read_only {
                return Err(AgentError::BlockReadOnly(label.to_string()));
            }
            if value.chars().count() > block.limit_chars {
                return Err(AgentError::BlockOverLimit(label.to_string(), block.limit_chars));
            }
            block.value = value;
            let updated = block.clone();
            state.agent.updated_at = Utc::now();
            (updated, state.agent.clone(), state.agent_log.clone())
        };
        agent_log
            .append(&AgentRecord { agent: agent_snapshot })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        Ok(updated)
    }

    /// Append text to a block's value (used by the `core_memory_append` tool).
    pub async fn append_memory_block(&self, id: AgentId, label: &str, text: &str) -> Result<MemoryBlock, AgentError> {
        let (updated, agent_snapshot, agent_log) = {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let mut state = entry.lock().unwrap();
            let block = state
                .agent
                .memory_blocks
                .get_mut(label)
                .ok_or_else(|| AgentError::BlockNotFound(label.to_string()))?;
            if !block.try_append(text) {
                if block.read_only {
                    return Err(AgentError::BlockReadOnly(label.to_string()));
                }
                return Err(AgentError::BlockOverLimit(label.to_string(), block.limit_chars));
            }
            let updated = block.clone();
            state.agent.updated_at = Utc::now();
            (updated, state.agent.clone(), state.agent_log.clone())
        };
        agent_log
            .append(&AgentRecord { agent: agent_snapshot })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        Ok(updated)
    }

    pub async fn add_memory_block(&self, id: AgentId, block: MemoryBlock) -> Result<(), AgentError> {
        let (agent_snapshot, agent_log) = {
            let entry = self.agents.get(&id).ok_or(AgentError::NotFound(id))?;
            let mut state = entry.lock().unwrap();
            state.agent.memory_blocks.insert(block.label.clone(), block);
            state.agent.updated_at = Utc::now();
            (state.agent.clone(), state.agent_log.clone())
        };
        agent_log
            .append(&AgentRecord { agent: agent_snapshot })
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("conclave-agent-{}", uuid::Uuid::new_v4()))
    }

    async fn build() -> (AgentStore, AgentId) {
        let store = AgentStore::new(temp_dir()).unwrap();
        let genesis = AgentConfig::genesis("gpt-4o", "you are helpful");
        let agent = store.create("assistant", genesis).await.unwrap();
        (store, agent.id)
    }

    #[tokio::test]
    async fn get_current_returns_genesis_initially() {
        let (store, id) = build().await;
        let current = store.get_current(id).unwrap();
        assert_eq!(current.model, "gpt-4o");
        assert!(current.parent_version.is_none());
    }

    #[tokio::test]
    async fn update_creates_new_version_and_repoints_current() {
        let (store, id) = build().await;
        let v1 = store.get_current(id).unwrap();
        let patch = AgentConfigPatch { temperature: Some(0.2), ..Default::default() };
        let v2 = store.update(id, patch, "lower temperature").await.unwrap();
        assert_ne!(v1.version_id, v2.version_id);
        assert_eq!(v2.parent_version, Some(v1.version_id));
        assert_eq!(store.get_current(id).unwrap().version_id, v2.version_id);
    }

    #[tokio::test]
    async fn identical_consecutive_updates_create_two_versions() {
        let (store, id) = build().await;
        let patch = AgentConfigPatch { temperature: Some(0.3), ..Default::default() };
        let v2 = store.update(id, patch.clone(), "a").await.unwrap();
        let v3 = store.update(id, patch, "b").await.unwrap();
        assert_ne!(v2.version_id, v3.version_id);
        assert_eq!(v2.temperature, v3.temperature);
        assert_eq!(store.list_versions(id, 10).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rollback_restores_content_without_mutating_history() {
        let (store, id) = build().await;
        let v1 = store.get_current(id).unwrap();
        store.update(id, AgentConfigPatch { temperature: Some(0.1), ..Default::default() }, "v2").await.unwrap();
        store.update(id, AgentConfigPatch { temperature: Some(0.9), ..Default::default() }, "v3").await.unwrap();

        let v4 = store.rollback(id, v1.version_id).await.unwrap();
        assert!(v4.content_eq(&v1));
        assert_eq!(v4.parent_version, Some(v1.version_id));

        let current = store.get_current(id).unwrap();
        assert!(current.content_eq(&v1));

        let versions = store.list_versions(id, 10).unwrap();
        assert_eq!(versions.len(), 4);
        assert_eq!(versions[0].version_id, v4.version_id);
    }

    #[tokio::test]
    async fn version_chain_stays_acyclic() {
        let (store, id) = build().await;
        store.update(id, AgentConfigPatch::default(), "noop").await.unwrap();
        assert!(store.version_chain_is_acyclic(id).unwrap());
    }

    #[tokio::test]
    async fn writing_block_over_limit_is_rejected_and_unchanged() {
        let (store, id) = build().await;
        store.add_memory_block(id, MemoryBlock::new("human", "short", 10)).await.unwrap();
        let err = store.set_memory_block_value(id, "human", "this is way too long").await.unwrap_err();
        assert!(matches!(err, AgentError::BlockOverLimit(_, _)));
        assert_eq!(store.get_memory_block(id, "human").unwrap().value, "short");
    }

    #[tokio::test]
    async fn writing_read_only_block_is_rejected() {
        let (store, id) = build().await;
        let mut block = MemoryBlock::new("persona", "fixed", 100);
        block.read_only = true;
        store.add_memory_block(id, block).await.unwrap();
        let err = store.set_memory_block_value(id, "persona", "changed").await.unwrap_err();
        assert!(matches!(err, AgentError::BlockReadOnly(_)));
    }

    #[tokio::test]
    async fn update_emits_config_changed_event() {
        let (store, id) = build().await;
        let mut rx = store.subscribe();
        store.update(id, AgentConfigPatch::default(), "noop").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.agent_id, id);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = temp_dir();
        let id;
        {
            let store = AgentStore::new(&dir).unwrap();
            let agent = store.create("a", AgentConfig::genesis("gpt-4o", "sys")).await.unwrap();
            id = agent.id;
            store.update(id, AgentConfigPatch { temperature: Some(0.3), ..Default::default() }, "v2").await.unwrap();
        }
        let reopened = AgentStore::new(&dir).unwrap();
        let current = reopened.get_current(id).unwrap();
        assert_eq!(current.temperature, 0.3);
        assert_eq!(reopened.list_versions(id, 10).unwrap().len(), 2);
    }
}
