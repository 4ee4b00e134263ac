//! C3 — Retention Gate (spec §4.3).
//!
//! A pure scoring function: given a memory item and the current time,
//! produce a retention score `r in [0,1]` and map it to an action. Grounded
//! on the teacher's `scorer.rs::is_core_eligible` (a weighted-sum-then-
//! threshold pure function over `MemoryEntry`) generalized from a single
//! boolean gate to the spec's five-way action mapping.

use chrono::{DateTime, Utc};
use conclave_core::config::RetentionConfig;

use crate::schema::{MemoryItem, RetentionAction};

/// Compute the retention score for `item` as of `now`, per the formula in
/// spec §4.3.
pub fn retention_score(item: &MemoryItem, now: DateTime<Utc>, cfg: &RetentionConfig) -> f64 {
    let imp = (item.importance as f64 / 10.0).clamp(0.0, 1.0);
    let acc = (1.0_f64).min(((item.access_count as f64) + 1.0).ln() / 5.0);
    let age_days = item.age_days(now).max(0.0);
    let temp = cfg.decay_base.powf(age_days);
    let boost = item.category.retention_boost();

    let raw = cfg.w_importance * imp + cfg.w_access * acc + cfg.w_temporal * temp + cfg.w_base;
    clamp01(raw * boost)
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Map a retention score to an action per spec §4.3's monotone thresholds,
/// ties broken toward the stronger action (i.e. each comparison is `>=` at
/// its lower bound).
pub fn retention_action(score: f64, cfg: &RetentionConfig) -> RetentionAction {
    if score >= cfg.boost_threshold {
        RetentionAction::Boost
    } else if score >= cfg.keep_threshold {
        RetentionAction::Keep
    } else if score >= cfg.consolidate_threshold {
        RetentionAction::Consolidate
    } else if score >= cfg.decay_threshold {
        RetentionAction::Decay
    } else {
        RetentionAction::Archive
    }
}

pub fn evaluate(item: &MemoryItem, now: DateTime<Utc>, cfg: &RetentionConfig) -> (f64, RetentionAction) {
    let score = retention_score(item, now, cfg);
    (score, retention_action(score, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemoryCategory, MemoryTier, SourceTag};
    use uuid::Uuid;

    fn aged_item(importance: f32, access_count: u64, age_days: i64, category: MemoryCategory) -> MemoryItem {
        let mut item = MemoryItem::new(
            Uuid::new_v4(),
            MemoryTier::Episodic,
            "content",
            importance,
            category,
            SourceTag::UserTurn,
        );
        item.access_count = access_count;
        item.created_at = Utc::now() - chrono::Duration::days(age_days);
        item
    }

    /// Spec invariant 13 (low end): importance=0, access_count=1, age=0 maps
    /// to DECAY or ARCHIVE.
    #[test]
    fn invariant_13_low_end() {
        let cfg = RetentionConfig::default();
        let item = aged_item(0.0, 1, 0, MemoryCategory::Fact);
        let (_, action) = evaluate(&item, Utc::now(), &cfg);
        assert!(matches!(action, RetentionAction::Decay | RetentionAction::Archive));
    }

    /// Spec invariant 13 (high end): importance=10, access_count=100, age=0,
    /// category=relationship_moment maps to BOOST.
    #[test]
    fn invariant_13_high_end_is_boost() {
        let cfg = RetentionConfig::default();
        let item = aged_item(10.0, 100, 0, MemoryCategory::RelationshipMoment);
        let (_, action) = evaluate(&item, Utc::now(), &cfg);
        assert_eq!(action, RetentionAction::Boost);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let cfg = RetentionConfig::default();
        let item = aged_item(10.0, 10_000, 0, MemoryCategory::RelationshipMoment);
        let (score, _) = evaluate(&item, Utc::now(), &cfg);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn old_low_importance_item_decays_toward_archive() {
        let cfg = RetentionConfig::default();
        let fresh = aged_item(3.0, 1, 0, MemoryCategory::Event);
        let old = aged_item(3.0, 1, 400, MemoryCategory::Event);
        let (fresh_score, _) = evaluate(&fresh, Utc::now(), &cfg);
        let (old_score, _) = evaluate(&old, Utc::now(), &cfg);
        assert!(old_score < fresh_score);
    }

    #[test]
    fn action_thresholds_are_monotone() {
        let cfg = RetentionConfig::default();
        assert_eq!(retention_action(0.90, &cfg), RetentionAction::Boost);
        assert_eq!(retention_action(0.85, &cfg), RetentionAction::Boost);
        assert_eq!(retention_action(0.70, &cfg), RetentionAction::Keep);
        assert_eq!(retention_action(0.50, &cfg), RetentionAction::Consolidate);
        assert_eq!(retention_action(0.30, &cfg), RetentionAction::Decay);
        assert_eq!(retention_action(0.10, &cfg), RetentionAction::Archive);
    }
}
