// src/test_mode.rs
// Simulated visitor conditions for exercising the gate by hand. Scenarios are flags in
// the same key-value store the verification cache uses, so they survive a reload.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::environment::HostEnvironment;
use crate::signals::{Collector, PartialVerdict};
use crate::store::{KeyValueStore, StoreError};

const FLAG_VALUE: &[u8] = b"true";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TestScenario {
    SlowNetwork,
    InsecureConnection,
    BotSignals,
    VpnConnection,
    TorConnection,
    DatacenterIp,
    SecureConnection,
}

impl TestScenario {
    /// Scenarios backed by a flag, in precedence order.
    pub const FLAGGED: [TestScenario; 6] = [
        TestScenario::SlowNetwork,
        TestScenario::InsecureConnection,
        TestScenario::BotSignals,
        TestScenario::VpnConnection,
        TestScenario::TorConnection,
        TestScenario::DatacenterIp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TestScenario::SlowNetwork => "slow-network",
            TestScenario::InsecureConnection => "insecure-connection",
            TestScenario::BotSignals => "bot-signals",
            TestScenario::VpnConnection => "vpn-connection",
            TestScenario::TorConnection => "tor-connection",
            TestScenario::DatacenterIp => "datacenter-ip",
            TestScenario::SecureConnection => "secure-connection",
        }
    }

    /// Store key of the scenario's flag. `SecureConnection` is the absence of flags.
    pub fn flag_key(self) -> Option<&'static str> {
        match self {
            TestScenario::SlowNetwork => Some("TEST_SLOW_NETWORK"),
            TestScenario::InsecureConnection => Some("TEST_INSECURE_CONNECTION"),
            TestScenario::BotSignals => Some("TEST_BOT_SIGNALS"),
            TestScenario::VpnConnection => Some("TEST_VPN_CONNECTION"),
            TestScenario::TorConnection => Some("TEST_TOR_CONNECTION"),
            TestScenario::DatacenterIp => Some("TEST_DATACENTER_IP"),
            TestScenario::SecureConnection => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScenarioFlags {
    pub slow_network: bool,
    pub insecure_connection: bool,
    pub bot_signals: bool,
    pub vpn: bool,
    pub tor: bool,
    pub datacenter: bool,
}

impl ScenarioFlags {
    pub fn any(&self) -> bool {
        self.slow_network
            || self.insecure_connection
            || self.bot_signals
            || self.vpn
            || self.tor
            || self.datacenter
    }
}

/// Clears every flag, then sets the one for `scenario`.
pub fn simulate(store: &dyn KeyValueStore, scenario: TestScenario) -> Result<(), StoreError> {
    clear(store)?;
    if let Some(key) = scenario.flag_key() {
        store.set(key, FLAG_VALUE)?;
    }
    tracing::info!(scenario = scenario.as_str(), "test scenario active");
    Ok(())
}

pub fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    for scenario in TestScenario::FLAGGED {
        if let Some(key) = scenario.flag_key() {
            store.delete(key)?;
        }
    }
    Ok(())
}

fn is_set(store: &dyn KeyValueStore, scenario: TestScenario) -> bool {
    let Some(key) = scenario.flag_key() else {
        return false;
    };
    match store.get(key) {
        Ok(value) => value.is_some_and(|bytes| !bytes.is_empty()),
        Err(err) => {
            tracing::debug!(key, error = %err, "test scenario flag unreadable");
            false
        }
    }
}

/// First set flag in precedence order, else `SecureConnection`.
pub fn current(store: &dyn KeyValueStore) -> TestScenario {
    TestScenario::FLAGGED
        .into_iter()
        .find(|scenario| is_set(store, *scenario))
        .unwrap_or(TestScenario::SecureConnection)
}

pub fn active_flags(store: &dyn KeyValueStore) -> ScenarioFlags {
    ScenarioFlags {
        slow_network: is_set(store, TestScenario::SlowNetwork),
        insecure_connection: is_set(store, TestScenario::InsecureConnection),
        bot_signals: is_set(store, TestScenario::BotSignals),
        vpn: is_set(store, TestScenario::VpnConnection),
        tor: is_set(store, TestScenario::TorConnection),
        datacenter: is_set(store, TestScenario::DatacenterIp),
    }
}

/// Adds a strong bot verdict while the bot-signals scenario is active.
pub struct ScenarioCollector {
    store: Arc<dyn KeyValueStore>,
}

impl ScenarioCollector {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Collector for ScenarioCollector {
    fn id(&self) -> &'static str {
        "test-scenario"
    }

    async fn collect(&self, _env: &dyn HostEnvironment) -> PartialVerdict {
        if is_set(self.store.as_ref(), TestScenario::BotSignals) {
            return PartialVerdict::scored(0.9, 0.9, "test-scenario")
                .with_reason("Simulated bot signals");
        }
        PartialVerdict::abstain("test-scenario")
    }
}
