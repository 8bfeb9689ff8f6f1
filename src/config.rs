//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a missing file or a partial file is
//! fine. Secrets (API keys) are referenced by env-var name in the config
//! and resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::engine::line_adjust::LineAdjustmentConfig;
use crate::parlay::{ConstructorConfig, CorrelationConfig, ParlayStyle};
use crate::validation::UnknownPolicy;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub agents: AgentsSection,
    pub correlation: CorrelationSection,
    pub validation: ValidationSection,
    pub line_adjustment: LineAdjustmentSection,
    pub storage: StorageSection,
}

/// One requested leg-count bucket.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TargetBucket {
    pub legs: usize,
    pub count: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSection {
    pub min_confidence: f64,
    pub style: ParlayStyle,
    pub max_leg_exposure: usize,
    pub targets: Vec<TargetBucket>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            min_confidence: 60.0,
            style: ParlayStyle::Diversified,
            max_leg_exposure: 3,
            targets: vec![
                TargetBucket { legs: 2, count: 3 },
                TargetBucket { legs: 3, count: 3 },
                TargetBucket { legs: 4, count: 2 },
            ],
        }
    }
}

impl EngineSection {
    /// Leg count → parlay count. Repeated leg counts are summed.
    pub fn target_map(&self) -> BTreeMap<usize, usize> {
        let mut map = BTreeMap::new();
        for bucket in &self.targets {
            *map.entry(bucket.legs).or_insert(0) += bucket.count;
        }
        map
    }

    pub fn constructor_config(&self) -> ConstructorConfig {
        ConstructorConfig {
            style: self.style,
            max_leg_exposure: self.max_leg_exposure.max(1),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AgentsSection {
    /// Agent name → weight override.
    pub weights: HashMap<String, f64>,
    /// Restrict to these agents. Empty means all.
    pub enabled: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorrelationSection {
    /// `"openrouter"` enables the oracle; anything else keeps heuristics only.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
    pub timeout_ms: u64,
    pub stack_bonus: f64,
    pub shootout_bonus: f64,
    pub script_penalty: f64,
    pub max_adjustment: f64,
}

impl Default for CorrelationSection {
    fn default() -> Self {
        let base = CorrelationConfig::default();
        Self {
            provider: None,
            model: None,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            max_tokens: None,
            timeout_ms: base.oracle_timeout.as_millis() as u64,
            stack_bonus: base.stack_bonus,
            shootout_bonus: base.shootout_bonus,
            script_penalty: base.script_penalty,
            max_adjustment: base.max_adjustment,
        }
    }
}

impl CorrelationSection {
    pub fn analyzer_config(&self) -> CorrelationConfig {
        CorrelationConfig {
            stack_bonus: self.stack_bonus,
            shootout_bonus: self.shootout_bonus,
            script_penalty: self.script_penalty,
            max_adjustment: self.max_adjustment.abs(),
            oracle_timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// API key for the configured oracle, if the env var is set.
    pub fn api_key(&self) -> Option<SecretString> {
        AppConfig::resolve_env(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::new)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ValidationSection {
    pub unknown_policy: UnknownPolicy,
    /// Optional JSON file of extra rule records.
    pub rules_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LineAdjustmentSection {
    pub sensitivity: f64,
    pub max_line: f64,
}

impl Default for LineAdjustmentSection {
    fn default() -> Self {
        let base = LineAdjustmentConfig::default();
        Self {
            sensitivity: base.sensitivity,
            max_line: base.max_line.to_f64().unwrap_or(1000.0),
        }
    }
}

impl LineAdjustmentSection {
    pub fn engine_config(&self) -> LineAdjustmentConfig {
        let base = LineAdjustmentConfig::default();
        LineAdjustmentConfig {
            sensitivity: self.sensitivity,
            max_line: Decimal::from_f64(self.max_line).unwrap_or(base.max_line),
            ..base
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSection {
    pub state_path: String,
    pub export_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_path: "propstack_state.json".to_string(),
            export_path: "propstack_export.jsonl".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
