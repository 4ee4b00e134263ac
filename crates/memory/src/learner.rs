//! C6 — Memory Learner: Hebbian association graph + feedback (spec §4.6).
//!
//! Grounded on the teacher's `sentiment.rs`/`multi_sleep.rs` pairing of "a
//! plain in-memory graph guarded by a mutex, persisted through the same
//! event-log pattern as everything else" — generalized here from the
//! teacher's sentiment-edge graph to an undirected strength graph between
//! arbitrary memory item ids.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use conclave_core::config::LearnerConfig;
use conclave_core::EventLog;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{Association, Feedback};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub association: Association,
}

/// Undirected, weighted association graph over memory item ids.
pub struct AssociationGraph {
    event_log: EventLog<AssociationEvent>,
    edges: Mutex<HashMap<(Uuid, Uuid), Association>>,
}

impl AssociationGraph {
    pub fn open(data_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = data_dir.as_ref().join("associations.jsonl");
        let event_log: EventLog<AssociationEvent> = EventLog::new(path);
        let events = event_log.load()?;
        let mut edges = HashMap::new();
        for event in events {
            let key = Association::key(event.association.a_id, event.association.b_id);
            edges.insert(key, event.association);
        }
        Ok(Self {
            event_log,
            edges: Mutex::new(edges),
        })
    }

    /// Co-occurrence reinforcement: strengthen the edge between `a` and `b`
    /// by `cfg.reinforce_eta`, clamped to `[0, 1]` (spec §4.6).
    pub async fn reinforce(&self, a: Uuid, b: Uuid, now: DateTime<Utc>, cfg: &LearnerConfig) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let key = Association::key(a, b);
        let updated = {
            let mut edges = self.edges.lock().unwrap();
            let entry = edges.entry(key).or_insert_with(|| Association {
                a_id: key.0,
                b_id: key.1,
                strength: 0.0,
                last_reinforced_at: now,
            });
            entry.strength = (entry.strength + cfg.reinforce_eta * (1.0 - entry.strength)).clamp(0.0, 1.0);
            entry.last_reinforced_at = now;
            entry.clone()
        };
        self.persist(updated).await
    }

    /// Apply a feedback signal by adjusting the strength of every edge
    /// touching `item_id` (spec §4.6 feedback table; sign/magnitude come
    /// from [`Feedback::delta_importance`], reused here since both are the
    /// same "how much does this memory deserve to be found again" signal).
    pub async fn apply_feedback(&self, item_id: Uuid, feedback: Feedback, now: DateTime<Utc>) -> Result<()> {
        let delta = (feedback.delta_importance() / 10.0) as f32;
        let touched: Vec<Association> = {
            let mut edges = self.edges.lock().unwrap();
            edges
                .values_mut()
                .filter(|e| e.a_id == item_id || e.b_id == item_id)
                .map(|e| {
                    e.strength = (e.strength + delta).clamp(0.0, 1.0);
                    e.last_reinforced_at = now;
                    e.clone()
                })
                .collect()
        };
        for assoc in touched {
            self.persist(assoc).await?;
        }
        Ok(())
    }

    /// Exponential time decay of every edge's strength, pruning edges that
    /// fall below `cfg.min_association_strength`.
    pub async fn decay_all(&self, now: DateTime<Utc>, cfg: &LearnerConfig) -> Result<()> {
        let (kept, dropped): (Vec<Association>, Vec<(Uuid, Uuid)>) = {
            let mut edges = self.edges.lock().unwrap();
            let mut kept = Vec::new();
            let mut dropped = Vec::new();
            for (key, edge) in edges.iter_mut() {
                let age_days = (now - edge.last_reinforced_at).num_seconds() as f64 / 86_400.0;
                let decay = (-age_days.max(0.0) / cfg.decay_lambda_days as f64).exp() as f32;
                edge.strength *= decay;
                if edge.strength < cfg.min_association_strength {
                    dropped.push(*key);
                } else {
                    kept.push(edge.clone());
                }
            }
            for key in &dropped {
                edges.remove(key);
            }
            (kept, dropped)
        };
        let _ = dropped;
        self.event_log.overwrite(
            &kept
                .into_iter()
                .map(|association| AssociationEvent {
                    event_id: Uuid::new_v4(),
                    occurred_at: now,
                    association,
                })
                .collect::<Vec<_>>(),
        )
        .await?;
        Ok(())
    }

    /// Items associated with `item_id`, strongest first, above
    /// `cfg.min_association_strength`.
    pub fn get_associated(&self, item_id: Uuid, cfg: &LearnerConfig) -> Vec<(Uuid, f32)> {
        let edges = self.edges.lock().unwrap();
        let mut out: Vec<(Uuid, f32)> = edges
            .values()
            .filter(|e| e.strength >= cfg.min_association_strength)
            .filter_map(|e| {
                if e.a_id == item_id {
                    Some((e.b_id, e.strength))
                } else if e.b_id == item_id {
                    Some((e.a_id, e.strength))
                } else {
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }

    async fn persist(&self, association: Association) -> Result<()> {
        self.event_log
            .append(&AssociationEvent {
                event_id: Uuid::new_v4(),
                occurred_at: association.last_reinforced_at,
                association,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LearnerConfig {
        LearnerConfig::default()
    }

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("conclave-learner-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn reinforce_creates_and_strengthens_edge() {
        let graph = AssociationGraph::open(temp_dir()).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        graph.reinforce(a, b, Utc::now(), &cfg()).await.unwrap();
        graph.reinforce(b, a, Utc::now(), &cfg()).await.unwrap();
        let assoc = graph.get_associated(a, &cfg());
        assert_eq!(assoc.len(), 1);
        // strength' = min(1, s + eta*(1-s)): 0 -> 0.1 -> 0.1 + 0.1*0.9 = 0.19.
        assert!((assoc[0].1 - 0.19).abs() < 1e-5);
    }

    #[tokio::test]
    async fn self_association_is_a_no_op() {
        let graph = AssociationGraph::open(temp_dir()).unwrap();
        let a = Uuid::new_v4();
        graph.reinforce(a, a, Utc::now(), &cfg()).await.unwrap();
        assert!(graph.get_associated(a, &cfg()).is_empty());
    }

    #[tokio::test]
    async fn feedback_nudges_all_touching_edges() {
        let graph = AssociationGraph::open(temp_dir()).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        graph.reinforce(a, b, Utc::now(), &cfg()).await.unwrap();
        graph.apply_feedback(a, Feedback::Helpful, Utc::now()).await.unwrap();
        let assoc = graph.get_associated(a, &cfg());
        assert!(assoc[0].1 > 0.2);
    }

    #[tokio::test]
    async fn decay_prunes_weak_edges() {
        let graph = AssociationGraph::open(temp_dir()).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let old = Utc::now() - chrono::Duration::days(3650);
        graph.reinforce(a, b, old, &cfg()).await.unwrap();
        graph.decay_all(Utc::now(), &cfg()).await.unwrap();
        assert!(graph.get_associated(a, &cfg()).is_empty());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = temp_dir();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        {
            let graph = AssociationGraph::open(&dir).unwrap();
            graph.reinforce(a, b, Utc::now(), &cfg()).await.unwrap();
        }
        let reopened = AssociationGraph::open(&dir).unwrap();
        assert_eq!(reopened.get_associated(a, &cfg()).len(), 1);
    }
}
