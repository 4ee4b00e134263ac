//! C5 — Hierarchical Memory: three-tier orchestration over [`MemoryStore`]
//! (episodic/semantic) and an in-process working tier, plus consolidation
//! (spec §4.5).
//!
//! The working tier has no durability requirement (spec: "no durability
//! requirement beyond the current process"), so it is a bare `lru::LruCache`
//! per agent rather than routed through the event-log-backed [`MemoryStore`]
//! that episodic/semantic use — the same split the teacher draws between its
//! hot `retrieval` cache and its durable `event_log`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use lru::LruCache;
use uuid::Uuid;

use conclave_core::config::{HierarchyConfig, LearnerConfig, RetentionConfig};

use crate::attention::{self, AttentionMode};
use crate::learner::AssociationGraph;
use crate::retention::{retention_action, retention_score};
use crate::schema::{MemoryCategory, MemoryItem, MemoryTier, RetentionAction};
use crate::store::{cosine_similarity, MemoryFilter, MemoryStore};

struct WorkingEntry {
    item: MemoryItem,
    session_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ScoredMemoryItem {
    pub item: MemoryItem,
    pub score: f64,
    pub tier: MemoryTier,
}

pub struct HierarchicalMemory {
    store: MemoryStore,
    graph: AssociationGraph,
    working: Mutex<HashMap<Uuid, LruCache<Uuid, WorkingEntry>>>,
    hierarchy_cfg: HierarchyConfig,
    retention_cfg: RetentionConfig,
    learner_cfg: LearnerConfig,
}

impl HierarchicalMemory {
    pub fn new(
        store: MemoryStore,
        graph: AssociationGraph,
        hierarchy_cfg: HierarchyConfig,
        retention_cfg: RetentionConfig,
        learner_cfg: LearnerConfig,
    ) -> Self {
        Self {
            store,
            graph,
            working: Mutex::new(HashMap::new()),
            hierarchy_cfg,
            retention_cfg,
            learner_cfg,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn graph(&self) -> &AssociationGraph {
        &self.graph
    }

    /// Route `item` by `(importance, category)` (spec §4.5) and always also
    /// write it into the working tier for `session_id`.
    pub async fn store_item(&self, item: MemoryItem, session_id: Uuid) -> Result<MemoryItem> {
        let routed_tier = if item.importance >= 8.0
            && matches!(item.category, MemoryCategory::Insight | MemoryCategory::RelationshipMoment)
        {
            MemoryTier::Semantic
        } else if item.importance >= 5.0 {
            MemoryTier::Episodic
        } else {
            MemoryTier::Working
        };

        let mut persisted = item.clone();
        if routed_tier != MemoryTier::Working {
            persisted.tier = routed_tier;
            self.store.put(persisted.clone()).await?;
        }

        let mut working_item = item;
        working_item.tier = MemoryTier::Working;
        self.insert_working(working_item.clone(), session_id);

        Ok(if routed_tier == MemoryTier::Working { working_item } else { persisted })
    }

    fn insert_working(&self, item: MemoryItem, session_id: Uuid) {
        let mut working = self.working.lock().unwrap();
        let cache = working
            .entry(item.agent_id)
            .or_insert_with(|| LruCache::new(NonZeroUsize::new(self.hierarchy_cfg.working_capacity.max(1)).unwrap()));
        cache.put(item.id, WorkingEntry { item, session_id });
    }

    /// Candidate pool for `search`: working (scoped to `session_id`) union
    /// episodic union semantic, for `agent_id`.
    fn candidates(&self, agent_id: Uuid, session_id: Uuid) -> Vec<(MemoryItem, MemoryTier)> {
        let mut out = Vec::new();
        if let Some(cache) = self.working.lock().unwrap().get(&agent_id) {
            out.extend(
                cache
                    .iter()
                    .filter(|(_, entry)| entry.session_id == session_id)
                    .map(|(_, entry)| (entry.item.clone(), MemoryTier::Working)),
            );
        }
        for item in self.store.list(agent_id, Some(MemoryTier::Episodic), &MemoryFilter::default()) {
            out.push((item, MemoryTier::Episodic));
        }
        for item in self.store.list(agent_id, Some(MemoryTier::Semantic), &MemoryFilter::default()) {
            out.push((item, MemoryTier::Semantic));
        }
        out
    }

    /// `search(query, k, mode?)` (spec §4.5): score candidates via C4's
    /// attentional bias and return the top `k`, tier-tagged.
    pub fn search(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        query: &str,
        query_embedding: Option<&[f32]>,
        k: usize,
        mode: Option<AttentionMode>,
    ) -> Vec<ScoredMemoryItem> {
        let mode = mode.unwrap_or_else(|| attention::analyze_query(query));
        let now = Utc::now();
        let mut scored: Vec<ScoredMemoryItem> = self
            .candidates(agent_id, session_id)
            .into_iter()
            .map(|(item, tier)| {
                let s = attention::score(&item, query_embedding, now, mode);
                ScoredMemoryItem { item, score: s.score, tier }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// Step (a): promote working items that have been accessed more than
    /// once (i.e. referenced again after their initial store — "reinforced")
    /// into the episodic tier.
    pub async fn promote_reinforced_working(&self, agent_id: Uuid) -> Result<usize> {
        let reinforced: Vec<MemoryItem> = {
            let working = self.working.lock().unwrap();
            working
                .get(&agent_id)
                .map(|cache| {
                    cache
                        .iter()
                        .filter(|(_, e)| e.item.access_count > 1)
                        .map(|(_, e)| e.item.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        let mut promoted = 0;
        for mut item in reinforced {
            item.tier = MemoryTier::Episodic;
            self.store.put(item).await?;
            promoted += 1;
        }
        Ok(promoted)
    }

    /// Step (b): run the retention gate over the episodic tier, lowering
    /// importance on `DECAY` items and removing `ARCHIVE` items.
    pub async fn sweep_episodic(&self, agent_id: Uuid, now: DateTime<Utc>) -> Result<RetentionSweepReport> {
        let items = self.store.list(agent_id, Some(MemoryTier::Episodic), &MemoryFilter::default());
        let mut report = RetentionSweepReport::default();
        for item in items {
            let score = retention_score(&item, now, &self.retention_cfg);
            let action = retention_action(score, &self.retention_cfg);
            match action {
                RetentionAction::Archive => {
                    self.store.delete(item.id).await?;
                    report.archived += 1;
                }
                RetentionAction::Decay => {
                    let mut updated = item;
                    updated.importance = (updated.importance - 1.0).max(0.0);
                    self.store.put(updated).await?;
                    report.decayed += 1;
                }
                RetentionAction::Boost | RetentionAction::Keep | RetentionAction::Consolidate => {
                    report.kept += 1;
                }
            }
        }
        Ok(report)
    }

    /// Step (c): promote items with `importance >= 8` and high access
    /// frequency (`access_count >= 5`, the teacher's informal "seen a lot"
    /// cutoff) into the semantic tier.
    pub async fn promote_semantic(&self, agent_id: Uuid) -> Result<usize> {
        let items = self.store.list(agent_id, Some(MemoryTier::Episodic), &MemoryFilter::default());
        let mut promoted = 0;
        for mut item in items {
            if item.importance >= 8.0 && item.access_count >= 5 {
                item.tier = MemoryTier::Semantic;
                self.store.put(item).await?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Step (d): merge near-duplicate items (cosine >= threshold) within a
    /// tier into one, keeping the max importance and summed access count.
    pub async fn merge_duplicates(&self, agent_id: Uuid, tier: MemoryTier) -> Result<usize> {
        let mut items = self.store.list(agent_id, Some(tier), &MemoryFilter::default());
        let mut merged_count = 0;
        let mut i = 0;
        while i < items.len() {
            let mut j = i + 1;
            while j < items.len() {
                let similar = match (items[i].embedding.as_deref(), items[j].embedding.as_deref()) {
                    (Some(a), Some(b)) => cosine_similarity(a, b) as f32 >= self.hierarchy_cfg.merge_similarity_threshold,
                    _ => false,
                };
                if similar {
                    let dup = items.remove(j);
                    items[i].importance = items[i].importance.max(dup.importance);
                    items[i].access_count += dup.access_count;
                    self.store.delete(dup.id).await?;
                    self.store.put(items[i].clone()).await?;
                    merged_count += 1;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        Ok(merged_count)
    }

    /// Full consolidation pass, cadence-gated by `turn_number` per spec
    /// §4.5/§4.9: episodic consolidation every `episodic_consolidation_every`
    /// turns, semantic promotion every `semantic_promotion_every` turns.
    pub async fn consolidate(&self, agent_id: Uuid, turn_number: u64, now: DateTime<Utc>) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();

        if turn_number % self.hierarchy_cfg.episodic_consolidation_every.max(1) == 0 {
            report.promoted_from_working = self.promote_reinforced_working(agent_id).await?;
            report.retention = self.sweep_episodic(agent_id, now).await?;
            report.merged_episodic = self.merge_duplicates(agent_id, MemoryTier::Episodic).await?;
        }

        if turn_number % self.hierarchy_cfg.semantic_promotion_every.max(1) == 0 {
            report.promoted_to_semantic = self.promote_semantic(agent_id).await?;
            report.merged_semantic = self.merge_duplicates(agent_id, MemoryTier::Semantic).await?;
        }

        Ok(report)
    }

    /// Co-access reinforcement (C6): call after a turn references a subset
    /// of the items returned by `search` together.
    pub async fn reinforce_co_access(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<()> {
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                self.graph.reinforce(ids[i], ids[j], now, &self.learner_cfg).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RetentionSweepReport {
    pub archived: usize,
    pub decayed: usize,
    pub kept: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ConsolidationReport {
    pub promoted_from_working: usize,
    pub retention: RetentionSweepReport,
    pub merged_episodic: usize,
    pub promoted_to_semantic: usize,
    pub merged_semantic: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SourceTag;

    fn temp_dir(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("conclave-hierarchy-{label}-{}", Uuid::new_v4()))
    }

    fn build() -> HierarchicalMemory {
        let store = MemoryStore::open(temp_dir("store")).unwrap();
        let graph = AssociationGraph::open(temp_dir("graph")).unwrap();
        HierarchicalMemory::new(store, graph, HierarchyConfig::default(), RetentionConfig::default(), LearnerConfig::default())
    }

    #[tokio::test]
    async fn high_importance_insight_routes_to_semantic() {
        let hm = build();
        let agent = Uuid::new_v4();
        let session = Uuid::new_v4();
        let item = MemoryItem::new(agent, MemoryTier::Episodic, "big insight", 9.0, MemoryCategory::Insight, SourceTag::UserTurn);
        let stored = hm.store_item(item, session).await.unwrap();
        assert_eq!(stored.tier, MemoryTier::Semantic);
        assert_eq!(hm.store.list(agent, Some(MemoryTier::Semantic), &MemoryFilter::default()).len(), 1);
    }

    #[tokio::test]
    async fn mid_importance_routes_to_episodic() {
        let hm = build();
        let agent = Uuid::new_v4();
        let session = Uuid::new_v4();
        let item = MemoryItem::new(agent, MemoryTier::Episodic, "ok fact", 6.0, MemoryCategory::Fact, SourceTag::UserTurn);
        hm.store_item(item, session).await.unwrap();
        assert_eq!(hm.store.list(agent, Some(MemoryTier::Episodic), &MemoryFilter::default()).len(), 1);
    }

    #[tokio::test]
    async fn low_importance_stays_in_working_only() {
        let hm = build();
        let agent = Uuid::new_v4();
        let session = Uuid::new_v4();
        let item = MemoryItem::new(agent, MemoryTier::Episodic, "trivia", 2.0, MemoryCategory::Event, SourceTag::UserTurn);
        hm.store_item(item, session).await.unwrap();
        assert_eq!(hm.store.list(agent, None, &MemoryFilter::default()).len(), 0);
    }

    #[tokio::test]
    async fn search_finds_items_across_tiers() {
        let hm = build();
        let agent = Uuid::new_v4();
        let session = Uuid::new_v4();
        hm.store_item(
            MemoryItem::new(agent, MemoryTier::Episodic, "python is the favourite language", 6.0, MemoryCategory::Preference, SourceTag::UserTurn),
            session,
        )
        .await
        .unwrap();
        let results = hm.search(agent, session, "what language do I like", None, 5, None);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn retention_sweep_removes_archive_eligible_items() {
        let hm = build();
        let agent = Uuid::new_v4();
        let mut item = MemoryItem::new(agent, MemoryTier::Episodic, "stale", 1.0, MemoryCategory::Event, SourceTag::UserTurn);
        item.created_at = Utc::now() - chrono::Duration::days(400);
        hm.store.put(item).await.unwrap();
        let report = hm.sweep_episodic(agent, Utc::now()).await.unwrap();
        assert_eq!(report.archived, 1);
        assert_eq!(hm.store.list(agent, Some(MemoryTier::Episodic), &MemoryFilter::default()).len(), 0);
    }

    #[tokio::test]
    async fn consolidate_is_cadence_gated() {
        let hm = build();
        let agent = Uuid::new_v4();
        let mut item = MemoryItem::new(agent, MemoryTier::Episodic, "stale", 1.0, MemoryCategory::Event, SourceTag::UserTurn);
        item.created_at = Utc::now() - chrono::Duration::days(400);
        hm.store.put(item).await.unwrap();

        // turn 3 is not a multiple of the default cadence (10): no sweep yet.
        hm.consolidate(agent, 3, Utc::now()).await.unwrap();
        assert_eq!(hm.store.list(agent, Some(MemoryTier::Episodic), &MemoryFilter::default()).len(), 1);

        // turn 10 triggers the episodic sweep.
        hm.consolidate(agent, 10, Utc::now()).await.unwrap();
        assert_eq!(hm.store.list(agent, Some(MemoryTier::Episodic), &MemoryFilter::default()).len(), 0);
    }
}
