//! C12 — Cost & Usage Tracker: per-request/session accumulation plus
//! day/week/month/total and by-model aggregates, with an optional
//! provider-native balance view kept distinguishable from local figures.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use conclave_core::EventLog;

use crate::schema::{Aggregate, CostStatistics, ProviderBalance, UsageRecord};

/// Optional external interface (spec §4.12): "When a provider-native
/// balance endpoint is available". No specific provider is prescribed.
#[async_trait]
pub trait ProviderBalanceSource: Send + Sync {
    async fn fetch_balance(&self) -> Result<ProviderBalance>;
}

pub struct CostTracker {
    event_log: EventLog<UsageRecord>,
    records: Mutex<Vec<UsageRecord>>,
    provider_source: Option<Box<dyn ProviderBalanceSource>>,
}

impl CostTracker {
    pub fn open(data_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = data_dir.as_ref().join("usage.jsonl");
        let event_log: EventLog<UsageRecord> = EventLog::new(path);
        let records = event_log.load()?;
        Ok(Self {
            event_log,
            records: Mutex::new(records),
            provider_source: None,
        })
    }

    pub fn with_provider_source(mut self, source: Box<dyn ProviderBalanceSource>) -> Self {
        self.provider_source = Some(source);
        self
    }

    /// Accept a record (spec §4.12: "Accepts `UsageRecord`s"), appended
    /// once per model call.
    pub async fn record(&self, record: UsageRecord) -> Result<()> {
        self.event_log.append(&record).await?;
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    pub fn total(&self) -> Aggregate {
        let mut agg = Aggregate::default();
        for r in self.records.lock().unwrap().iter() {
            agg.add(r);
        }
        agg
    }

    pub fn for_session(&self, session_id: Uuid) -> Aggregate {
        let mut agg = Aggregate::default();
        for r in self.records.lock().unwrap().iter().filter(|r| r.session_id == session_id) {
            agg.add(r);
        }
        agg
    }

    pub fn by_model(&self) -> HashMap<String, Aggregate> {
        let mut out: HashMap<String, Aggregate> = HashMap::new();
        for r in self.records.lock().unwrap().iter() {
            out.entry(r.model.clone()).or_default().add(r);
        }
        out
    }

    pub fn by_day(&self) -> std::collections::BTreeMap<chrono::NaiveDate, Aggregate> {
        let mut out: std::collections::BTreeMap<chrono::NaiveDate, Aggregate> = std::collections::BTreeMap::new();
        for r in self.records.lock().unwrap().iter() {
            out.entry(r.timestamp.date_naive()).or_default().add(r);
        }
        out
    }

    pub fn since(&self, cutoff: DateTime<Utc>) -> Aggregate {
        let mut agg = Aggregate::default();
        for r in self.records.lock().unwrap().iter().filter(|r| r.timestamp >= cutoff) {
            agg.add(r);
        }
        agg
    }

    pub fn week_to_date(&self, now: DateTime<Utc>) -> Aggregate {
        self.since(now - chrono::Duration::days(7))
    }

    pub fn month_to_date(&self, now: DateTime<Utc>) -> Aggregate {
        self.since(now - chrono::Duration::days(30))
    }

    pub async fn statistics(&self) -> CostStatistics {
        let provider_native = match &self.provider_source {
            Some(source) => source.fetch_balance().await.ok(),
            None => None,
        };
        CostStatistics {
            total: self.total(),
            by_model: self.by_model(),
            by_day: self.by_day(),
            provider_native,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("conclave-cost-{}", Uuid::new_v4()))
    }

    fn record(session: Uuid, model: &str, cost: f64) -> UsageRecord {
        UsageRecord {
            timestamp: Utc::now(),
            session_id: session,
            model: model.to_string(),
            prompt_tokens: 100,
            completion_tokens: 50,
            reasoning_tokens: None,
            cost,
            tool_calls_made: 1,
        }
    }

    #[tokio::test]
    async fn total_sums_every_record() {
        let tracker = CostTracker::open(temp_dir()).unwrap();
        let session = Uuid::new_v4();
        tracker.record(record(session, "gpt-4o", 0.01)).await.unwrap();
        tracker.record(record(session, "gpt-4o", 0.02)).await.unwrap();
        let total = tracker.total();
        assert_eq!(total.request_count, 2);
        assert!((total.cost - 0.03).abs() < 1e-9);
    }

    #[tokio::test]
    async fn by_model_groups_correctly() {
        let tracker = CostTracker::open(temp_dir()).unwrap();
        let session = Uuid::new_v4();
        tracker.record(record(session, "gpt-4o", 0.01)).await.unwrap();
        tracker.record(record(session, "claude-3-7", 0.05)).await.unwrap();
        let by_model = tracker.by_model();
        assert_eq!(by_model.len(), 2);
        assert_eq!(by_model["gpt-4o"].request_count, 1);
    }

    #[tokio::test]
    async fn for_session_filters_other_sessions() {
        let tracker = CostTracker::open(temp_dir()).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        tracker.record(record(a, "gpt-4o", 0.01)).await.unwrap();
        tracker.record(record(b, "gpt-4o", 0.02)).await.unwrap();
        assert_eq!(tracker.for_session(a).request_count, 1);
    }

    #[tokio::test]
    async fn statistics_without_provider_source_is_none() {
        let tracker = CostTracker::open(temp_dir()).unwrap();
        let stats = tracker.statistics().await;
        assert!(stats.provider_native.is_none());
    }

    struct FixedBalance;
    #[async_trait]
    impl ProviderBalanceSource for FixedBalance {
        async fn fetch_balance(&self) -> Result<ProviderBalance> {
            Ok(ProviderBalance { total_granted: 10.0, total_used: 2.0, remaining: 8.0 })
        }
    }

    #[tokio::test]
    async fn statistics_surfaces_provider_native_distinctly() {
        let tracker = CostTracker::open(temp_dir()).unwrap().with_provider_source(Box::new(FixedBalance));
        let session = Uuid::new_v4();
        tracker.record(record(session, "gpt-4o", 0.01)).await.unwrap();
        let stats = tracker.statistics().await;
        assert!((stats.total.cost - 0.01).abs() < 1e-9);
        let provider = stats.provider_native.unwrap();
        assert_eq!(provider.remaining, 8.0);
    }
}
