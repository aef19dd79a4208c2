// src/trust/mod.rs
// Connection trust: folds transport security, link speed, anonymizer and datacenter
// indicators, device class and platform into one score, then derives the bypass flags
// the router uses to skip detection or the challenge.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::environment::{HostEnvironment, ProbeError};
use crate::signals::connection::{assess_link, LinkWeights};
use crate::signals::{clamp_unit, LinkSpeed};
use crate::store::KeyValueStore;
use crate::test_mode;

const BASE_TRUST: f64 = 0.5;
const CONSERVATIVE_TRUST: f64 = 0.3;

/// Link bonuses when scoring trust; cellular 4g/5g earns its bonus through `fast` only.
pub const TRUST_LINK_WEIGHTS: LinkWeights = LinkWeights {
    wired_or_wifi: 0.1,
    cellular_fast: 0.0,
};

const MOBILE_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    #[serde(rename = "iOS")]
    Ios,
    Windows,
    #[serde(rename = "macOS")]
    MacOs,
    Linux,
    Unknown,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("android") {
            Platform::Android
        } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
            Platform::Ios
        } else if ua.contains("windows") {
            Platform::Windows
        } else if ua.contains("macintosh") || ua.contains("mac os") {
            Platform::MacOs
        } else if ua.contains("linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }

    fn trust_adjustment(self) -> f64 {
        match self {
            Platform::Ios | Platform::Android => 0.1,
            Platform::Windows | Platform::MacOs => 0.05,
            Platform::Linux => -0.05,
            Platform::Unknown => -0.1,
        }
    }
}

pub fn is_mobile_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Everything the trust score is computed from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrustSignals {
    pub secure: bool,
    pub speed: LinkSpeed,
    /// Adjustment earned while classifying the link.
    pub link_adjustment: f64,
    pub vpn: bool,
    pub tor: bool,
    pub datacenter: bool,
    pub proxy: bool,
    pub mobile: bool,
    pub platform: Platform,
    pub canvas_available: bool,
}

impl Default for TrustSignals {
    fn default() -> Self {
        Self {
            secure: false,
            speed: LinkSpeed::Medium,
            link_adjustment: 0.0,
            vpn: false,
            tor: false,
            datacenter: false,
            proxy: false,
            mobile: false,
            platform: Platform::Unknown,
            canvas_available: false,
        }
    }
}

impl TrustSignals {
    pub fn score(&self) -> f64 {
        let mut trust = BASE_TRUST + self.link_adjustment;

        if self.vpn {
            trust -= 0.2;
        }
        if self.tor {
            trust -= 0.4;
        }
        if self.datacenter {
            trust -= 0.3;
        }
        if self.proxy {
            trust -= 0.3;
        }
        if !self.secure {
            trust -= 0.3;
        }
        if self.speed == LinkSpeed::Slow {
            trust -= 0.1;
        }

        if self.mobile {
            trust += 0.1;
        }
        if self.canvas_available {
            trust += 0.1;
        }
        if self.secure {
            trust += 0.2;
        }
        if self.speed == LinkSpeed::Fast {
            trust += 0.1;
        }

        trust += self.platform.trust_adjustment();
        clamp_unit(trust)
    }

    fn apply_scenario(&mut self, flags: test_mode::ScenarioFlags) {
        if flags.vpn {
            self.vpn = true;
        }
        if flags.tor {
            self.tor = true;
        }
        if flags.datacenter {
            self.datacenter = true;
        }
        if flags.slow_network {
            self.speed = LinkSpeed::Slow;
        }
        if flags.insecure_connection {
            self.secure = false;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionTrust {
    pub trust_score: f64,
    pub secure: bool,
    pub is_anonymizing: bool,
    pub is_trusted: bool,
    pub skip_bot_check: bool,
    pub skip_challenge: bool,
    pub speed: LinkSpeed,
    /// Inputs behind the score; absent on the conservative fallback.
    pub signals: Option<TrustSignals>,
}

impl ConnectionTrust {
    pub fn from_signals(signals: TrustSignals, config: &GateConfig) -> Self {
        let trust_score = signals.score();
        let secure = signals.secure;
        let is_anonymizing = signals.vpn || signals.tor;
        let is_trusted = trust_score >= config.trusted_threshold && secure;
        Self {
            trust_score,
            secure,
            is_anonymizing,
            is_trusted,
            skip_bot_check: is_trusted && !is_anonymizing,
            skip_challenge: trust_score >= config.skip_challenge_threshold && secure,
            speed: signals.speed,
            signals: Some(signals),
        }
    }

    /// Low trust with every bypass off; used when the evaluation itself failed.
    pub fn conservative(secure: bool) -> Self {
        Self {
            trust_score: CONSERVATIVE_TRUST,
            secure,
            is_anonymizing: false,
            is_trusted: false,
            skip_bot_check: false,
            skip_challenge: false,
            speed: LinkSpeed::Medium,
            signals: None,
        }
    }
}

pub struct TrustEvaluator {
    config: GateConfig,
    datacenter_ranges: Vec<IpNet>,
}

impl TrustEvaluator {
    /// Unparseable CIDR entries are logged and skipped.
    pub fn new(config: &GateConfig) -> Self {
        let datacenter_ranges = config
            .datacenter_ranges
            .iter()
            .filter_map(|raw| match raw.trim().parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(err) => {
                    tracing::warn!(range = %raw, error = %err, "ignoring invalid datacenter range");
                    None
                }
            })
            .collect();
        Self {
            config: config.clone(),
            datacenter_ranges,
        }
    }

    pub fn is_datacenter_ip(&self, ip: IpAddr) -> bool {
        self.datacenter_ranges.iter().any(|net| net.contains(&ip))
    }

    /// Reads every trust input from the host. `store` carries the test scenario flags.
    pub async fn gather(
        &self,
        env: &dyn HostEnvironment,
        store: Option<&dyn KeyValueStore>,
    ) -> Result<TrustSignals, ProbeError> {
        let user_agent = env.user_agent()?;
        let link = assess_link(env, TRUST_LINK_WEIGHTS).await?;
        let hints = env.connection_hints();

        let datacenter = hints.datacenter
            || hints
                .client_ip
                .map_or(false, |ip| self.is_datacenter_ip(ip));
        let proxy = hints.proxy || hints.via_header || hints.forwarded_hops > 1;

        let mut signals = TrustSignals {
            secure: env.is_secure_transport(),
            speed: link.speed,
            link_adjustment: link.trust_adjustment,
            vpn: hints.vpn,
            tor: hints.tor,
            datacenter,
            proxy,
            mobile: is_mobile_agent(&user_agent),
            platform: Platform::from_user_agent(&user_agent),
            canvas_available: matches!(env.canvas_fingerprint(), Ok(Some(_))),
        };

        if self.config.test_mode {
            if let Some(store) = store {
                let flags = test_mode::active_flags(store);
                if flags.any() {
                    tracing::debug!(?flags, "applying simulated connection scenario");
                }
                signals.apply_scenario(flags);
            }
        }

        Ok(signals)
    }

    /// Never fails; a probe error yields `ConnectionTrust::conservative`.
    pub async fn evaluate(
        &self,
        env: &dyn HostEnvironment,
        store: Option<&dyn KeyValueStore>,
    ) -> ConnectionTrust {
        match self.gather(env, store).await {
            Ok(signals) => {
                let trust = ConnectionTrust::from_signals(signals, &self.config);
                tracing::debug!(
                    trust_score = trust.trust_score,
                    secure = trust.secure,
                    anonymizing = trust.is_anonymizing,
                    skip_bot_check = trust.skip_bot_check,
                    "connection trust evaluated"
                );
                trust
            }
            Err(err) => {
                tracing::warn!(error = %err, "trust evaluation failed; using conservative trust");
                ConnectionTrust::conservative(env.is_secure_transport())
            }
        }
    }
}

#[cfg(test)]
mod tests;
