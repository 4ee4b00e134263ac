//! Per-1k-token pricing used to turn a model call's token usage into a
//! dollar figure (spec §4.9's `max_cost` turn bound and §4.12's
//! `UsageRecord.cost` need a concrete number; the spec names no pricing
//! table, so this is an ambient, config-overridable default rather than a
//! hardcoded constant — grounded on the teacher's `conclave-token`
//! `ModelFamily` detection, reused here so pricing and token counting agree
//! on what "family" a model belongs to).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FamilyRate {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    pub gpt: FamilyRate,
    pub claude: FamilyRate,
    pub llama: FamilyRate,
    pub unknown: FamilyRate,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            gpt: FamilyRate { prompt_per_1k: 0.005, completion_per_1k: 0.015 },
            claude: FamilyRate { prompt_per_1k: 0.003, completion_per_1k: 0.015 },
            llama: FamilyRate { prompt_per_1k: 0.0002, completion_per_1k: 0.0002 },
            // Deliberately the most expensive of the known families: an
            // unknown model should never look artificially cheap against a
            // cost budget.
            unknown: FamilyRate { prompt_per_1k: 0.005, completion_per_1k: 0.015 },
        }
    }
}

impl PricingTable {
    pub fn estimate(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let rate = match conclave_token::ModelFamily::detect(model) {
            conclave_token::ModelFamily::Gpt => self.gpt,
            conclave_token::ModelFamily::Claude => self.claude,
            conclave_token::ModelFamily::Llama => self.llama,
            conclave_token::ModelFamily::Unknown => self.unknown,
        };
        (prompt_tokens as f64 / 1000.0) * rate.prompt_per_1k + (completion_tokens as f64 / 1000.0) * rate.completion_per_1k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_tokens() {
        let table = PricingTable::default();
        let small = table.estimate("gpt-4o", 1000, 0);
        let large = table.estimate("gpt-4o", 2000, 0);
        assert!(large > small);
        assert!((small - table.gpt.prompt_per_1k).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_is_not_cheaper_than_known_families() {
        let table = PricingTable::default();
        let unknown = table.estimate("some-mystery-model", 1000, 1000);
        let cheapest = table.estimate("llama3.1", 1000, 1000);
        assert!(unknown >= cheapest);
    }
}
