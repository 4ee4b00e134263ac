//! C4 — Attentional Bias (spec §4.4).
//!
//! Multi-factor relevance scoring of a memory item against a query, with a
//! Query Analyzer that selects one of five weighting modes from the query
//! text. Grounded on the teacher's `retrieval.rs::score_entry_ref` (weighted
//! sum of named factors plus a human-readable rationale string for
//! observability), generalized from the teacher's fixed 4-factor formula to
//! the spec's 5-factor, 5-mode table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{MemoryCategory, MemoryItem};
use crate::store::cosine_similarity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionMode {
    Standard,
    SemanticHeavy,
    TemporalHeavy,
    ImportanceHeavy,
    Emotional,
}

struct Weights {
    semantic: f64,
    temporal: f64,
    importance: f64,
    access: f64,
    category: f64,
}

impl AttentionMode {
    fn weights(self) -> Weights {
        match self {
            AttentionMode::Standard => Weights { semantic: 0.40, temporal: 0.15, importance: 0.20, access: 0.15, category: 0.10 },
            AttentionMode::SemanticHeavy => Weights { semantic: 0.65, temporal: 0.05, importance: 0.15, access: 0.10, category: 0.05 },
            AttentionMode::TemporalHeavy => Weights { semantic: 0.25, temporal: 0.45, importance: 0.10, access: 0.15, category: 0.05 },
            AttentionMode::ImportanceHeavy => Weights { semantic: 0.25, temporal: 0.10, importance: 0.45, access: 0.10, category: 0.10 },
            AttentionMode::Emotional => Weights { semantic: 0.30, temporal: 0.10, importance: 0.15, access: 0.15, category: 0.30 },
        }
    }

    /// tau (temporal decay constant, hours) per mode — temporal-heavy modes
    /// decay more slowly so older-but-relevant items stay visible.
    fn tau_hours(self) -> f64 {
        match self {
            AttentionMode::TemporalHeavy => 24.0 * 14.0,
            AttentionMode::Emotional => 24.0 * 10.0,
            _ => 24.0 * 7.0,
        }
    }

    /// sigma (access-recency decay constant, hours).
    fn sigma_hours(self) -> f64 {
        match self {
            AttentionMode::ImportanceHeavy | AttentionMode::SemanticHeavy => 24.0 * 21.0,
            _ => 24.0 * 14.0,
        }
    }

    fn category_affinity(self, category: MemoryCategory) -> f64 {
        use MemoryCategory::*;
        match (self, category) {
            (AttentionMode::Emotional, Emotion) => 1.0,
            (AttentionMode::Emotional, RelationshipMoment) => 0.8,
            (AttentionMode::ImportanceHeavy, Insight) => 1.0,
            (AttentionMode::ImportanceHeavy, RelationshipMoment) => 0.8,
            (AttentionMode::TemporalHeavy, Event) => 1.0,
            (_, Fact) => 0.5,
            (_, Preference) => 0.5,
            (_, Event) => 0.4,
            (_, Insight) => 0.4,
            (_, Emotion) => 0.3,
            (_, RelationshipMoment) => 0.3,
        }
    }
}

const TEMPORAL_KEYWORDS: &[&str] = &["when", "last time", "yesterday", "wann", "letztes mal", "earlier", "before"];
const EMOTIONAL_KEYWORDS: &[&str] = &["feel", "feeling", "sad", "happy", "angry", "upset", "love", "afraid", "anxious"];
const IMPORTANCE_KEYWORDS: &[&str] = &["most important", "critical", "best", "worst", "urgent", "priority"];

/// Pick a weighting mode from the query text (spec §4.4 Query Analyzer).
pub fn analyze_query(query: &str) -> AttentionMode {
    let q = query.to_ascii_lowercase();
    if TEMPORAL_KEYWORDS.iter().any(|kw| q.contains(kw)) {
        AttentionMode::TemporalHeavy
    } else if EMOTIONAL_KEYWORDS.iter().any(|kw| q.contains(kw)) {
        AttentionMode::Emotional
    } else if IMPORTANCE_KEYWORDS.iter().any(|kw| q.contains(kw)) {
        AttentionMode::ImportanceHeavy
    } else {
        AttentionMode::Standard
    }
}

#[derive(Debug, Clone)]
pub struct AttentionScore {
    pub score: f64,
    pub mode: AttentionMode,
    pub rationale: String,
}

/// Score `item` against `query_embedding` (may be `None`) under `mode`.
pub fn score(item: &MemoryItem, query_embedding: Option<&[f32]>, now: DateTime<Utc>, mode: AttentionMode) -> AttentionScore {
    let w = mode.weights();

    let semantic = match (query_embedding, item.embedding.as_deref()) {
        (Some(q), Some(e)) => cosine_similarity(q, e) as f64,
        _ => 0.0,
    };
    let age_hours = item.age_days(now).max(0.0) * 24.0;
    let temporal = (-age_hours / mode.tau_hours()).exp();
    let importance = (item.importance as f64 / 10.0).clamp(0.0, 1.0);
    let hours_since_access = item.hours_since_access(now).max(0.0);
    let access = (-hours_since_access / mode.sigma_hours()).exp();
    let category = mode.category_affinity(item.category);

    let total = w.semantic * semantic + w.temporal * temporal + w.importance * importance + w.access * access + w.category * category;

    AttentionScore {
        score: total,
        mode,
        rationale: format!(
            "sem={semantic:.2} temp={temporal:.2} imp={importance:.2} acc={access:.2} cat={category:.2}"
        ),
    }
}
