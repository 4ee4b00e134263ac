//! Data model for the hierarchical memory engine (spec §3, §4.2–§4.6).
//!
//! Generalizes the teacher's six-tier `MemoryEntry`/`MemoryTier`
//! (`crates/memory/src/schema.rs`) down to the spec's three tiers, and adds
//! the fields (`importance`, `access_count`, `embedding`, `category`) the
//! teacher's entry never needed because it had no retention gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    Working,
    Episodic,
    Semantic,
}

impl MemoryTier {
    pub fn slug(self) -> &'static str {
        match self {
            MemoryTier::Working => "working",
            MemoryTier::Episodic => "episodic",
            MemoryTier::Semantic => "semantic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Fact,
    Preference,
    Event,
    Emotion,
    Insight,
    RelationshipMoment,
}

impl MemoryCategory {
    /// Multiplicative boost applied by the retention gate (spec §4.3).
    pub fn retention_boost(self) -> f64 {
        match self {
            MemoryCategory::RelationshipMoment => 1.5,
            MemoryCategory::Emotion => 1.3,
            MemoryCategory::Insight => 1.2,
            MemoryCategory::Preference => 1.0,
            MemoryCategory::Fact => 0.9,
            MemoryCategory::Event => 0.8,
        }
    }
}

/// Who/what produced a memory item. Generalizes the teacher's free-form
/// `source: String` slug into a closed enum since the core only ever
/// produces items from these four places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    UserTurn,
    ToolResult,
    Consolidation,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub tier: MemoryTier,
    pub content: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Clamped to `[0, 10]` (spec invariant 4).
    pub importance: f32,
    pub category: MemoryCategory,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Always `>= 1` (spec invariant 4): an item's creation counts as its
    /// first access.
    pub access_count: u64,
    pub source: SourceTag,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl MemoryItem {
    pub fn new(
        agent_id: Uuid,
        tier: MemoryTier,
        content: impl Into<String>,
        importance: f32,
        category: MemoryCategory,
        source: SourceTag,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            tier,
            content: content.into(),
            embedding: None,
            importance: importance.clamp(0.0, 10.0),
            category,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            source,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 86_400.0
    }

    pub fn hours_since_access(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_accessed_at).num_seconds() as f64 / 3_600.0
    }
}

/// An undirected edge in the Hebbian association graph (spec §4.6, C6).
/// `(a_id, b_id)` is always stored with `a_id <= b_id` so `(a,b)` and `(b,a)`
/// collapse to one edge (spec invariant 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub a_id: Uuid,
    pub b_id: Uuid,
    pub strength: f32,
    pub last_reinforced_at: DateTime<Utc>,
}

impl Association {
    pub fn key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// The retention gate's verdict for a memory item (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionAction {
    Boost,
    Keep,
    Consolidate,
    Decay,
    Archive,
}

/// Feedback signal accepted by the memory learner (spec §4.6 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helpful,
    NotHelpful,
    Incorrect,
    Outdated,
    Redundant,
}

impl Feedback {
    pub fn delta_importance(self) -> f32 {
        match self {
            Feedback::Helpful => 0.5,
            Feedback::NotHelpful => -0.2,
            Feedback::Incorrect => -1.0,
            Feedback::Outdated => -0.2,
            Feedback::Redundant => -0.2,
        }
    }
}
