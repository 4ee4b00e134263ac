//! C12 — Cost & Usage Tracker (spec §4.12).

pub mod pricing;
pub mod schema;
pub mod tracker;

pub use pricing::{FamilyRate, PricingTable};
pub use schema::{Aggregate, CostStatistics, ProviderBalance, UsageRecord};
pub use tracker::{CostTracker, ProviderBalanceSource};
