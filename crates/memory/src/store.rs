//! C2 — Memory Store: durable key-value + vector storage for memory items.
//!
//! Storage is a triad lifted directly from the teacher's
//! `crates/memory/src/event_log.rs` + `index.rs`:
//!
//! 1. An append-only JSONL [`conclave_core::EventLog`] — the source of truth,
//!    crash-safe (`fsync` on append, write-tmp-then-rename on overwrite).
//! 2. A `redb` secondary index (`entries` + `tier_index` tables) for
//!    tier-scoped lookups without a full log replay.
//! 3. An in-process `lru::LruCache` hot path for recently touched items.
//!
//! `vector_search` is expressed against the [`EmbeddingIndex`] trait so the
//! core carries no mandatory dependency on a specific vector database
//! (Non-goal, spec §1); the default implementation does a brute-force cosine
//! scan, adequate for the working/episodic tiers' realistic sizes.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conclave_core::EventLog;

use crate::schema::{MemoryCategory, MemoryItem, MemoryTier};

const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");
const TIER_TABLE: TableDefinition<&str, &str> = TableDefinition::new("tier_index");
const LRU_CAPACITY: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecordEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub entry: MemoryItem,
}

/// Filter applied by [`MemoryStore::list`] (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub tier: Option<MemoryTier>,
    pub category: Option<MemoryCategory>,
    pub importance_range: Option<(f32, f32)>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl MemoryFilter {
    fn matches(&self, item: &MemoryItem) -> bool {
        if let Some(tier) = self.tier {
            if item.tier != tier {
                return false;
            }
        }
        if let Some(category) = self.category {
            if item.category != category {
                return false;
            }
        }
        if let Some((lo, hi)) = self.importance_range {
            if item.importance < lo || item.importance > hi {
                return false;
            }
        }
        if let Some((lo, hi)) = self.time_range {
            if item.created_at < lo || item.created_at > hi {
                return false;
            }
        }
        true
    }
}

/// Pluggable vector index backend (Non-goal: no specific implementation is
/// prescribed). The default brute-force impl lives below.
pub trait EmbeddingIndex: Send + Sync {
    fn search(&self, query: &[f32], candidates: &[MemoryItem], k: usize) -> Vec<Uuid>;
}

pub struct BruteForceCosine;

impl EmbeddingIndex for BruteForceCosine {
    fn search(&self, query: &[f32], candidates: &[MemoryItem], k: usize) -> Vec<Uuid> {
        let mut scored: Vec<(Uuid, f32)> = candidates
            .iter()
            .filter_map(|item| {
                item.embedding
                    .as_ref()
                    .map(|e| (item.id, cosine_similarity(query, e)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(k).map(|(id, _)| id).collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Compact secondary-index record — excludes the embedding and full content
/// so the redb file stays small; full items live in the event log and the
/// LRU cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedEntry {
    id: Uuid,
    tier: u8,
    content_hash: String,
}

fn tier_to_u8(tier: MemoryTier) -> u8 {
    match tier {
        MemoryTier::Working => 0,
        MemoryTier::Episodic => 1,
        MemoryTier::Semantic => 2,
    }
}

fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    format!("{:x}", h.finalize())
}

pub struct MemoryStore {
    event_log: EventLog<MemoryRecordEvent>,
    db: Database,
    items: Mutex<Vec<MemoryItem>>,
    cache: Mutex<LruCache<Uuid, MemoryItem>>,
    embedding_index: Box<dyn EmbeddingIndex>,
}

impl MemoryStore {
    /// Open (or create) the store rooted at `data_dir`. Replays the event
    /// log to rebuild the in-memory working set and the redb index.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let log_path: PathBuf = data_dir.join("memory_events.jsonl");
        let index_path = data_dir.join("memory_index.redb");

        let event_log: EventLog<MemoryRecordEvent> = EventLog::new(log_path);
        let db = Database::create(&index_path)
            .with_context(|| format!("opening redb index at {}", index_path.display()))?;
        {
            let tx = db.begin_write()?;
            tx.open_table(ENTRIES_TABLE)?;
            tx.open_table(TIER_TABLE)?;
            tx.commit()?;
        }

        let mut store = Self {
            event_log,
            db,
            items: Mutex::new(Vec::new()),
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(LRU_CAPACITY).unwrap())),
            embedding_index: Box::new(BruteForceCosine),
        };

        let events = store.event_log.load()?;
        let mut items = Vec::with_capacity(events.len());
        for event in events {
            store.index_insert(&event.entry)?;
            items.push(event.entry);
        }
        *store.items.get_mut().unwrap() = items;
        Ok(store)
    }

    pub fn set_embedding_index(&mut self, index: Box<dyn EmbeddingIndex>) {
        self.embedding_index = index;
    }

    fn index_insert(&self, item: &MemoryItem) -> Result<()> {
        let id_str = item.id.to_string();
        let indexed = IndexedEntry {
            id: item.id,
            tier: tier_to_u8(item.tier),
            content_hash: content_hash(&item.content),
        };
        let bytes = serde_json::to_vec(&indexed)?;

        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(ENTRIES_TABLE)?;
            tbl.insert(id_str.as_str(), bytes.as_slice())?;

            let slug = item.tier.slug();
            let mut tier_tbl = tx.open_table(TIER_TABLE)?;
            let existing = tier_tbl
                .get(slug)?
                .map(|v| v.value().to_string())
                .unwrap_or_default();
            let updated = if existing.is_empty() {
                id_str.clone()
            } else if existing.split('\n').any(|s| s == id_str) {
                existing
            } else {
                format!("{existing}\n{id_str}")
            };
            tier_tbl.insert(slug, updated.as_str())?;
        }
        tx.commit()?;
        Ok(())
    }

    /// `put(item)` — append to the event log, update the redb index, warm
    /// the LRU cache and the in-memory working set.
    pub async fn put(&self, item: MemoryItem) -> Result<()> {
        let event = MemoryRecordEvent {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            entry: item.clone(),
        };
        self.event_log.append(&event).await?;
        self.index_insert(&item)?;
        self.cache.lock().unwrap().put(item.id, item.clone());

        let mut items = self.items.lock().unwrap();
        if let Some(existing) = items.iter_mut().find(|e| e.id == item.id) {
            *existing = item;
        } else {
            items.push(item);
        }
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<MemoryItem> {
        if let Some(item) = self.cache.lock().unwrap().get(&id) {
            return Some(item.clone());
        }
        self.items.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|e| e.id != id);
        let removed = items.len() < before;
        let snapshot = items.clone();
        drop(items);
        if removed {
            let events: Vec<MemoryRecordEvent> = snapshot
                .into_iter()
                .map(|entry| MemoryRecordEvent {
                    event_id: Uuid::new_v4(),
                    occurred_at: Utc::now(),
                    entry,
                })
                .collect();
            self.event_log.overwrite(&events).await?;
            self.cache.lock().unwrap().pop(&id);
        }
        Ok(removed)
    }

    /// `update_access(id, now)` — bump `access_count` and `last_accessed_at`.
    pub async fn update_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let updated = {
            let mut items = self.items.lock().unwrap();
            match items.iter_mut().find(|e| e.id == id) {
                Some(item) => {
                    item.access_count += 1;
                    item.last_accessed_at = now;
                    Some(item.clone())
                }
                None => None,
            }
        };
        if let Some(item) = updated {
            let event = MemoryRecordEvent {
                event_id: Uuid::new_v4(),
                occurred_at: now,
                entry: item.clone(),
            };
            self.event_log.append(&event).await?;
            self.cache.lock().unwrap().put(id, item);
        }
        Ok(())
    }

    pub fn vector_search(&self, embedding: &[f32], k: usize, filter: &MemoryFilter) -> Vec<MemoryItem> {
        let items = self.items.lock().unwrap();
        let candidates: Vec<MemoryItem> = items.iter().filter(|i| filter.matches(i)).cloned().collect();
        let ids: HashSet<Uuid> = self.embedding_index.search(embedding, &candidates, k).into_iter().collect();
        candidates.into_iter().filter(|i| ids.contains(&i.id)).collect()
    }

    pub fn list(&self, agent_id: Uuid, tier: Option<MemoryTier>, filter: &MemoryFilter) -> Vec<MemoryItem> {
        let items = self.items.lock().unwrap();
        items
            .iter()
            .filter(|i| i.agent_id == agent_id)
            .filter(|i| tier.map(|t| i.tier == t).unwrap_or(true))
            .filter(|i| filter.matches(i))
            .cloned()
            .collect()
    }

    pub fn all_for_agent(&self, agent_id: Uuid) -> Vec<MemoryItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.agent_id == agent_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemoryCategory, SourceTag};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("conclave-store-{}", Uuid::new_v4()))
    }

    fn item(agent: Uuid, tier: MemoryTier) -> MemoryItem {
        MemoryItem::new(agent, tier, "hello", 5.0, MemoryCategory::Fact, SourceTag::UserTurn)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::open(temp_dir()).unwrap();
        let agent = Uuid::new_v4();
        let it = item(agent, MemoryTier::Episodic);
        let id = it.id;
        store.put(it).await.unwrap();
        assert_eq!(store.get(id).unwrap().id, id);
    }

    #[tokio::test]
    async fn delete_removes_item() {
        let store = MemoryStore::open(temp_dir()).unwrap();
        let agent = Uuid::new_v4();
        let it = item(agent, MemoryTier::Episodic);
        let id = it.id;
        store.put(it).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(store.get(id).is_none());
    }

    #[tokio::test]
    async fn list_filters_by_tier_and_agent() {
        let store = MemoryStore::open(temp_dir()).unwrap();
        let agent = Uuid::new_v4();
        store.put(item(agent, MemoryTier::Episodic)).await.unwrap();
        store.put(item(agent, MemoryTier::Semantic)).await.unwrap();
        store.put(item(Uuid::new_v4(), MemoryTier::Episodic)).await.unwrap();

        let got = store.list(agent, Some(MemoryTier::Episodic), &MemoryFilter::default());
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = temp_dir();
        let agent = Uuid::new_v4();
        let id;
        {
            let store = MemoryStore::open(&dir).unwrap();
            let it = item(agent, MemoryTier::Semantic);
            id = it.id;
            store.put(it).await.unwrap();
        }
        let reopened = MemoryStore::open(&dir).unwrap();
        assert_eq!(reopened.get(id).unwrap().id, id);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
