// src/config/mod.rs
// Gate configuration. Supplied by the embedding application or loaded as JSON from a
// key-value store; every field has a documented default and is clamped on load.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::KeyValueStore;

pub const DEFAULT_CONFIG_KEY: &str = "visitor-gate:config";

const TIMEOUT_MS_MIN: u64 = 100;
const TIMEOUT_MS_MAX: u64 = 60_000;
const CHALLENGE_ATTEMPTS_MIN: u8 = 1;
const CHALLENGE_ATTEMPTS_MAX: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration store unavailable")]
    StoreUnavailable,
    #[error("configuration missing")]
    MissingConfig,
    #[error("configuration invalid: {0}")]
    InvalidConfig(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::StoreUnavailable => "Configuration unavailable (storage error)",
            ConfigError::MissingConfig => "Configuration unavailable (no stored config)",
            ConfigError::InvalidConfig(_) => "Configuration unavailable (invalid config)",
        }
    }
}

/// Threshold presets for the deployments the gate is known to run in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentProfile {
    /// Bot at 0.7, challenge at 0.3.
    Standard,
    /// Gateway-route variant: challenge threshold raised to 0.4.
    Router,
    /// Challenges nearly everyone, reserves the bot page for near-certain automation.
    Sensitive,
}

impl DeploymentProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentProfile::Standard => "standard",
            DeploymentProfile::Router => "router",
            DeploymentProfile::Sensitive => "sensitive",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GateConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_bot_threshold")]
    pub bot_threshold: f64,
    #[serde(default = "default_challenge_threshold")]
    pub challenge_threshold: f64,
    #[serde(default = "default_enable_caching")]
    pub enable_caching: bool,
    #[serde(default = "default_cache_expiry_ms")]
    pub cache_expiry_ms: u64,
    #[serde(default = "default_skip_verification_for_trusted_connections")]
    pub skip_verification_for_trusted_connections: bool,
    #[serde(default = "default_connection_trust_threshold")]
    pub connection_trust_threshold: f64,
    #[serde(default = "default_trusted_threshold")]
    pub trusted_threshold: f64,
    #[serde(default = "default_skip_challenge_threshold")]
    pub skip_challenge_threshold: f64,
    #[serde(default = "default_challenge_max_attempts")]
    pub challenge_max_attempts: u8,
    #[serde(default = "default_force_bot_trust_floor")]
    pub force_bot_trust_floor: f64,
    #[serde(default = "default_slow_link_trust_floor")]
    pub slow_link_trust_floor: f64,
    #[serde(default)]
    pub datacenter_ranges: Vec<String>,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            timeout_ms: default_timeout_ms(),
            bot_threshold: default_bot_threshold(),
            challenge_threshold: default_challenge_threshold(),
            enable_caching: default_enable_caching(),
            cache_expiry_ms: default_cache_expiry_ms(),
            skip_verification_for_trusted_connections:
                default_skip_verification_for_trusted_connections(),
            connection_trust_threshold: default_connection_trust_threshold(),
            trusted_threshold: default_trusted_threshold(),
            skip_challenge_threshold: default_skip_challenge_threshold(),
            challenge_max_attempts: default_challenge_max_attempts(),
            force_bot_trust_floor: default_force_bot_trust_floor(),
            slow_link_trust_floor: default_slow_link_trust_floor(),
            datacenter_ranges: Vec::new(),
            test_mode: false,
        }
    }
}

impl GateConfig {
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        let mut cfg = GateConfig::default();
        match profile {
            DeploymentProfile::Standard => {}
            DeploymentProfile::Router => {
                cfg.challenge_threshold = 0.4;
            }
            DeploymentProfile::Sensitive => {
                cfg.bot_threshold = 0.9;
                cfg.challenge_threshold = 0.05;
                cfg.enable_caching = false;
            }
        }
        cfg
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut cfg = serde_json::from_str::<GateConfig>(text)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        clamp_config_values(&mut cfg);
        Ok(cfg)
    }

    /// Loads config stored as JSON under `key`.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Result<Self, ConfigError> {
        let raw = store
            .get(key)
            .map_err(|_| ConfigError::StoreUnavailable)?
            .ok_or(ConfigError::MissingConfig)?;
        let mut cfg = serde_json::from_slice::<GateConfig>(&raw)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        clamp_config_values(&mut cfg);
        Ok(cfg)
    }

    /// Same as `load`, falling back to defaults when nothing usable is stored.
    pub fn load_or_default(store: &dyn KeyValueStore, key: &str) -> Self {
        match GateConfig::load(store, key) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::debug!(error = %err, key, "using default gate config");
                GateConfig::default()
            }
        }
    }

    /// Applies `GATE_*` environment overrides. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("GATE_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = env_parse::<f64>("GATE_BOT_THRESHOLD") {
            self.bot_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("GATE_CHALLENGE_THRESHOLD") {
            self.challenge_threshold = v;
        }
        if let Some(v) = env_bool("GATE_ENABLE_CACHING") {
            self.enable_caching = v;
        }
        if let Some(v) = env_bool("GATE_TEST_MODE") {
            self.test_mode = v;
        }
        clamp_config_values(self);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_expiry(&self) -> Duration {
        Duration::from_millis(self.cache_expiry_ms)
    }
}

pub(crate) fn clamp_config_values(cfg: &mut GateConfig) {
    cfg.timeout_ms = cfg.timeout_ms.clamp(TIMEOUT_MS_MIN, TIMEOUT_MS_MAX);
    cfg.bot_threshold = clamp_unit(cfg.bot_threshold, default_bot_threshold());
    cfg.challenge_threshold = clamp_unit(cfg.challenge_threshold, default_challenge_threshold());
    if cfg.challenge_threshold > cfg.bot_threshold {
        cfg.challenge_threshold = cfg.bot_threshold;
    }
    cfg.connection_trust_threshold = clamp_unit(
        cfg.connection_trust_threshold,
        default_connection_trust_threshold(),
    );
    cfg.trusted_threshold = clamp_unit(cfg.trusted_threshold, default_trusted_threshold());
    cfg.skip_challenge_threshold =
        clamp_unit(cfg.skip_challenge_threshold, default_skip_challenge_threshold());
    cfg.force_bot_trust_floor =
        clamp_unit(cfg.force_bot_trust_floor, default_force_bot_trust_floor());
    cfg.slow_link_trust_floor =
        clamp_unit(cfg.slow_link_trust_floor, default_slow_link_trust_floor());
    cfg.challenge_max_attempts = cfg
        .challenge_max_attempts
        .clamp(CHALLENGE_ATTEMPTS_MIN, CHALLENGE_ATTEMPTS_MAX);
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_bot_threshold() -> f64 {
    0.7
}

fn default_challenge_threshold() -> f64 {
    0.3
}

fn default_enable_caching() -> bool {
    true
}

fn default_cache_expiry_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_skip_verification_for_trusted_connections() -> bool {
    true
}

fn default_connection_trust_threshold() -> f64 {
    0.6
}

fn default_trusted_threshold() -> f64 {
    0.7
}

fn default_skip_challenge_threshold() -> f64 {
    0.5
}

fn default_challenge_max_attempts() -> u8 {
    3
}

fn default_force_bot_trust_floor() -> f64 {
    0.2
}

fn default_slow_link_trust_floor() -> f64 {
    0.4
}

#[cfg(test)]
mod tests;
