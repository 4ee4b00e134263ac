//! Data model for the cost & usage tracker (spec §3 `UsageRecord`, §4.12).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
    pub cost: f64,
    pub tool_calls_made: u32,
}

/// A running sum over some subset of [`UsageRecord`]s.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub reasoning_tokens: u64,
    pub cost: f64,
    pub tool_calls: u64,
    pub request_count: u64,
}

impl Aggregate {
    pub fn add(&mut self, record: &UsageRecord) {
        self.prompt_tokens += record.prompt_tokens;
        self.completion_tokens += record.completion_tokens;
        self.reasoning_tokens += record.reasoning_tokens.unwrap_or(0);
        self.cost += record.cost;
        self.tool_calls += record.tool_calls_made as u64;
        self.request_count += 1;
    }
}

/// Authoritative remote balance, from an optional provider-native endpoint
/// (spec §6 `GET /costs/openrouter`). Kept distinguishable from the local
/// [`Aggregate`] per spec §9's "two cost trackers" design note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderBalance {
    pub total_granted: f64,
    pub total_used: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostStatistics {
    pub total: Aggregate,
    pub by_model: std::collections::HashMap<String, Aggregate>,
    pub by_day: std::collections::BTreeMap<chrono::NaiveDate, Aggregate>,
    /// `None` until a provider-native source is configured; always
    /// surfaced under a distinct field from `total` (spec §4.12).
    pub provider_native: Option<ProviderBalance>,
}
