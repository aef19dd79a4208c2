use super::*;
use crate::environment::{ConnectionHints, ConnectionType, EnvironmentReport, NetworkInfo, Probe};
use crate::store::InMemoryStore;
use crate::test_mode::{simulate, TestScenario};
use crate::test_support::human_report;

fn evaluator() -> TrustEvaluator {
    TrustEvaluator::new(&GateConfig::default())
}

#[test]
fn platform_is_read_from_the_user_agent() {
    assert_eq!(
        Platform::from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
        Platform::Android
    );
    assert_eq!(
        Platform::from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
        Platform::Ios
    );
    assert_eq!(
        Platform::from_user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"),
        Platform::MacOs
    );
    assert_eq!(Platform::from_user_agent("curl/8.4.0"), Platform::Unknown);
    assert!(is_mobile_agent("Opera/9.80 (J2ME/MIDP; Opera Mini/9.80)"));
    assert!(!is_mobile_agent("Mozilla/5.0 (X11; Linux x86_64)"));
}

#[test]
fn score_combines_penalties_and_bonuses() {
    let signals = TrustSignals {
        secure: true,
        speed: LinkSpeed::Medium,
        platform: Platform::Linux,
        vpn: true,
        ..TrustSignals::default()
    };
    // 0.5 - 0.2 (vpn) + 0.2 (secure) - 0.05 (linux)
    assert!((signals.score() - 0.45).abs() < 1e-9);
}

#[test]
fn score_is_clamped() {
    let hostile = TrustSignals {
        tor: true,
        datacenter: true,
        proxy: true,
        speed: LinkSpeed::Slow,
        ..TrustSignals::default()
    };
    assert_eq!(hostile.score(), 0.0);

    let friendly = TrustSignals {
        secure: true,
        speed: LinkSpeed::Fast,
        link_adjustment: 0.1,
        mobile: true,
        platform: Platform::Ios,
        canvas_available: true,
        ..TrustSignals::default()
    };
    assert_eq!(friendly.score(), 1.0);
}

#[test]
fn derived_flags_follow_thresholds() {
    let config = GateConfig::default();
    let secure_vpn = TrustSignals {
        secure: true,
        platform: Platform::Windows,
        canvas_available: true,
        speed: LinkSpeed::Fast,
        link_adjustment: 0.1,
        vpn: true,
        ..TrustSignals::default()
    };
    let trust = ConnectionTrust::from_signals(secure_vpn, &config);
    // 0.5 + 0.1 - 0.2 + 0.1 + 0.2 + 0.1 + 0.05
    assert!((trust.trust_score - 0.85).abs() < 1e-9);
    assert!(trust.is_trusted);
    assert!(trust.is_anonymizing);
    assert!(!trust.skip_bot_check);
    assert!(trust.skip_challenge);
}

#[test]
fn insecure_transport_is_never_trusted() {
    let signals = TrustSignals {
        secure: false,
        link_adjustment: 1.0,
        ..TrustSignals::default()
    };
    let trust = ConnectionTrust::from_signals(signals, &GateConfig::default());
    assert!(!trust.is_trusted);
    assert!(!trust.skip_challenge);
}

#[tokio::test]
async fn secure_desktop_on_wifi_skips_the_bot_check() {
    let trust = evaluator().evaluate(&human_report(), None).await;
    assert_eq!(trust.trust_score, 1.0);
    assert!(trust.skip_bot_check);
    assert_eq!(trust.speed, LinkSpeed::Fast);
}

#[tokio::test]
async fn forwarding_chain_counts_as_proxy() {
    let mut env = human_report();
    env.hints = ConnectionHints {
        forwarded_hops: 2,
        ..ConnectionHints::default()
    };
    let signals = evaluator().gather(&env, None).await.unwrap();
    assert!(signals.proxy);

    env.hints.forwarded_hops = 1;
    let signals = evaluator().gather(&env, None).await.unwrap();
    assert!(!signals.proxy);
}

#[tokio::test]
async fn client_ip_inside_configured_ranges_is_datacenter() {
    let config = GateConfig {
        datacenter_ranges: vec![
            "203.0.113.0/24".to_string(),
            "not-a-cidr".to_string(),
            "2001:db8::/32".to_string(),
        ],
        ..GateConfig::default()
    };
    let evaluator = TrustEvaluator::new(&config);
    assert!(evaluator.is_datacenter_ip("203.0.113.42".parse().unwrap()));
    assert!(evaluator.is_datacenter_ip("2001:db8::1".parse().unwrap()));
    assert!(!evaluator.is_datacenter_ip("198.51.100.7".parse().unwrap()));

    let mut env = human_report();
    env.hints.client_ip = Some("203.0.113.9".parse().unwrap());
    let trust = evaluator.evaluate(&env, None).await;
    assert_eq!(trust.signals.map(|s| s.datacenter), Some(true));
}

#[tokio::test]
async fn cellular_fast_link_earns_only_the_speed_bonus() {
    let env = EnvironmentReport {
        user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile".to_string(),
        secure: true,
        network: Some(NetworkInfo {
            connection_type: Some(ConnectionType::Cellular),
            effective_type: Some("5g".to_string()),
            save_data: false,
        }),
        ..EnvironmentReport::default()
    };
    let signals = evaluator().gather(&env, None).await.unwrap();
    assert_eq!(signals.speed, LinkSpeed::Fast);
    assert_eq!(signals.link_adjustment, 0.0);
    assert!(signals.mobile);
    assert_eq!(signals.platform, Platform::Android);
}

#[tokio::test]
async fn probe_failure_falls_back_to_conservative_trust() {
    let mut env = human_report();
    env.mark_failed(Probe::UserAgent);
    let trust = evaluator().evaluate(&env, None).await;
    assert_eq!(trust, ConnectionTrust::conservative(true));
    assert!(!trust.skip_bot_check);
    assert!(!trust.skip_challenge);
}

#[tokio::test]
async fn scenarios_apply_only_in_test_mode() {
    let store = InMemoryStore::new();
    simulate(&store, TestScenario::TorConnection).unwrap();

    let live = evaluator().evaluate(&human_report(), Some(&store)).await;
    assert!(!live.is_anonymizing);

    let testing = TrustEvaluator::new(&GateConfig {
        test_mode: true,
        ..GateConfig::default()
    });
    let simulated = testing.evaluate(&human_report(), Some(&store)).await;
    assert!(simulated.is_anonymizing);
    assert!(!simulated.skip_bot_check);
}

#[tokio::test]
async fn insecure_scenario_overrides_transport() {
    let store = InMemoryStore::new();
    simulate(&store, TestScenario::InsecureConnection).unwrap();
    let testing = TrustEvaluator::new(&GateConfig {
        test_mode: true,
        ..GateConfig::default()
    });
    let trust = testing.evaluate(&human_report(), Some(&store)).await;
    assert!(!trust.secure);
    assert!(!trust.is_trusted);
}
