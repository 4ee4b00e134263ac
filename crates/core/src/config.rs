//! Layered application configuration.
//!
//! Mirrors `aigent-config::AppConfig::load_from`: a TOML file supplies
//! defaults for every section, environment variables (loaded via `dotenvy`)
//! override a handful of deployment-specific values. Every numeric bound
//! named in spec §4.9/§5 is a field here so operators can tune it without a
//! rebuild.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_steps: usize,
    pub max_tool_calls: usize,
    pub max_wall_time_secs: u64,
    pub max_cost_usd: f64,
    pub max_retries: u32,
    pub tool_timeout_secs: u64,
    pub llm_call_timeout_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_tool_calls: 30,
            max_wall_time_secs: 120,
            max_cost_usd: 1.00,
            max_retries: 3,
            tool_timeout_secs: 30,
            llm_call_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of memory items requested from `Hierarchy::search` per turn.
    pub memory_top_k: usize,
    /// Percentage of `max_tokens` at which `needs_summarization` is set.
    pub summarization_threshold_pct: f32,
    /// Target token length for a produced summary (C13).
    pub summary_target_tokens: usize,
    pub auto_summarize: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            memory_top_k: 8,
            summarization_threshold_pct: 0.80,
            summary_target_tokens: 1500,
            auto_summarize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub decay_base: f64,
    pub w_importance: f64,
    pub w_access: f64,
    pub w_temporal: f64,
    pub w_base: f64,
    pub boost_threshold: f64,
    pub keep_threshold: f64,
    pub consolidate_threshold: f64,
    pub decay_threshold: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            decay_base: 0.995,
            w_importance: 0.35,
            w_access: 0.30,
            w_temporal: 0.25,
            w_base: 0.10,
            boost_threshold: 0.85,
            keep_threshold: 0.60,
            consolidate_threshold: 0.40,
            decay_threshold: 0.20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub working_capacity: usize,
    /// Consolidate the episodic tier every N turns.
    pub episodic_consolidation_every: u64,
    /// Promote eligible items into the semantic tier every N turns.
    pub semantic_promotion_every: u64,
    pub merge_similarity_threshold: f32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            working_capacity: 100,
            episodic_consolidation_every: 10,
            semantic_promotion_every: 100,
            merge_similarity_threshold: 0.97,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub reinforce_eta: f32,
    pub decay_lambda_days: f32,
    pub min_association_strength: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            reinforce_eta: 0.1,
            decay_lambda_days: 30.0,
            min_association_strength: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory under which all JSONL event logs and the redb index
    /// live. Mirrors the teacher's single-deployment-directory assumption.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".conclave".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_dir: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub r#loop: LoopConfig,
    pub context: ContextConfig,
    pub retention: RetentionConfig,
    pub hierarchy: HierarchyConfig,
    pub learner: LearnerConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load `path` if present (TOML), falling back to defaults, then apply
    /// environment overrides. Matches `aigent_config::AppConfig::load_from`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(&path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(dir) = env::var("CONCLAVE_DATA_DIR") {
            if !dir.is_empty() {
                config.storage.data_dir = dir;
            }
        }
        if let Ok(port) = env::var("CONCLAVE_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_bounds() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.r#loop.max_steps, 20);
        assert_eq!(cfg.r#loop.max_tool_calls, 30);
        assert_eq!(cfg.r#loop.max_wall_time_secs, 120);
        assert_eq!(cfg.r#loop.max_cost_usd, 1.00);
        assert_eq!(cfg.hierarchy.working_capacity, 100);
        assert_eq!(cfg.hierarchy.episodic_consolidation_every, 10);
        assert_eq!(cfg.hierarchy.semantic_promotion_every, 100);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = AppConfig::default();
        let dir = tempfile_dir();
        let path = dir.join("config.toml");
        cfg.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.r#loop.max_steps, cfg.r#loop.max_steps);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("conclave-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
