use super::*;
use crate::store::{InMemoryStore, KeyValueStore};

fn clear_env(keys: &[&str]) {
    for key in keys {
        std::env::remove_var(key);
    }
}

const OVERRIDE_KEYS: [&str; 5] = [
    "GATE_TIMEOUT_MS",
    "GATE_BOT_THRESHOLD",
    "GATE_CHALLENGE_THRESHOLD",
    "GATE_ENABLE_CACHING",
    "GATE_TEST_MODE",
];

#[test]
fn defaults_match_documented_values() {
    let cfg = GateConfig::default();
    assert_eq!(cfg.timeout_ms, 3000);
    assert_eq!(cfg.bot_threshold, 0.7);
    assert_eq!(cfg.challenge_threshold, 0.3);
    assert!(cfg.enable_caching);
    assert_eq!(cfg.cache_expiry(), Duration::from_secs(24 * 60 * 60));
    assert!(cfg.skip_verification_for_trusted_connections);
    assert_eq!(cfg.connection_trust_threshold, 0.6);
    assert_eq!(cfg.challenge_max_attempts, 3);
    assert!(!cfg.test_mode);
}

#[test]
fn partial_json_keeps_defaults_for_missing_fields() {
    let cfg = GateConfig::from_json(
        r#"{"bot_threshold":0.9,"challenge_threshold":0.05,"enable_caching":false}"#,
    )
    .unwrap();
    assert_eq!(cfg.bot_threshold, 0.9);
    assert_eq!(cfg.challenge_threshold, 0.05);
    assert!(!cfg.enable_caching);
    assert_eq!(cfg.timeout_ms, 3000);
    assert_eq!(cfg.connection_trust_threshold, 0.6);
}

#[test]
fn out_of_range_values_are_clamped() {
    let cfg = GateConfig::from_json(
        r#"{"timeout_ms":5,"bot_threshold":1.7,"challenge_threshold":-2.0,"challenge_max_attempts":0}"#,
    )
    .unwrap();
    assert_eq!(cfg.timeout_ms, 100);
    assert_eq!(cfg.bot_threshold, 1.0);
    assert_eq!(cfg.challenge_threshold, 0.0);
    assert_eq!(cfg.challenge_max_attempts, 1);
}

#[test]
fn challenge_threshold_never_exceeds_bot_threshold() {
    let cfg =
        GateConfig::from_json(r#"{"bot_threshold":0.5,"challenge_threshold":0.8}"#).unwrap();
    assert_eq!(cfg.challenge_threshold, 0.5);
}

#[test]
fn invalid_json_is_reported() {
    let err = GateConfig::from_json("{not json").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
    assert_eq!(err.user_message(), "Configuration unavailable (invalid config)");
}

#[test]
fn profiles_select_threshold_presets() {
    let router = GateConfig::for_profile(DeploymentProfile::Router);
    assert_eq!(router.challenge_threshold, 0.4);
    assert_eq!(router.bot_threshold, 0.7);

    let sensitive = GateConfig::for_profile(DeploymentProfile::Sensitive);
    assert_eq!(sensitive.bot_threshold, 0.9);
    assert_eq!(sensitive.challenge_threshold, 0.05);
    assert!(!sensitive.enable_caching);
    assert_eq!(DeploymentProfile::Sensitive.as_str(), "sensitive");
}

#[test]
fn load_reads_json_from_store() {
    let store = InMemoryStore::new();
    store
        .set(DEFAULT_CONFIG_KEY, br#"{"timeout_ms":1500,"test_mode":true}"#)
        .unwrap();
    let cfg = GateConfig::load(&store, DEFAULT_CONFIG_KEY).unwrap();
    assert_eq!(cfg.timeout_ms, 1500);
    assert!(cfg.test_mode);
}

#[test]
fn load_reports_missing_config() {
    let store = InMemoryStore::new();
    assert_eq!(
        GateConfig::load(&store, DEFAULT_CONFIG_KEY),
        Err(ConfigError::MissingConfig)
    );
    assert_eq!(
        GateConfig::load_or_default(&store, DEFAULT_CONFIG_KEY),
        GateConfig::default()
    );
}

#[test]
fn load_reports_store_outage() {
    let store = crate::test_support::FailingStore;
    assert_eq!(
        GateConfig::load(&store, DEFAULT_CONFIG_KEY),
        Err(ConfigError::StoreUnavailable)
    );
}

#[test]
fn env_overrides_apply_and_clamp() {
    let _lock = crate::test_support::lock_env();
    clear_env(&OVERRIDE_KEYS);
    std::env::set_var("GATE_TIMEOUT_MS", "2500");
    std::env::set_var("GATE_BOT_THRESHOLD", "0.85");
    std::env::set_var("GATE_CHALLENGE_THRESHOLD", "0.95");
    std::env::set_var("GATE_ENABLE_CACHING", "off");
    std::env::set_var("GATE_TEST_MODE", "true");

    let mut cfg = GateConfig::default();
    cfg.apply_env_overrides();
    clear_env(&OVERRIDE_KEYS);

    assert_eq!(cfg.timeout_ms, 2500);
    assert_eq!(cfg.bot_threshold, 0.85);
    assert_eq!(cfg.challenge_threshold, 0.85);
    assert!(!cfg.enable_caching);
    assert!(cfg.test_mode);
}

#[test]
fn unparseable_env_overrides_are_ignored() {
    let _lock = crate::test_support::lock_env();
    clear_env(&OVERRIDE_KEYS);
    std::env::set_var("GATE_TIMEOUT_MS", "soon");
    std::env::set_var("GATE_ENABLE_CACHING", "maybe");

    let mut cfg = GateConfig::default();
    cfg.apply_env_overrides();
    clear_env(&OVERRIDE_KEYS);

    assert_eq!(cfg.timeout_ms, 3000);
    assert!(cfg.enable_caching);
}
