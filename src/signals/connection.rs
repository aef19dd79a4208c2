// src/signals/connection.rs
// Connection quality: link type or measured fetch latency plus transport security.
// Produces the `ConnectionQuality` observation; only scores as bot-like when the
// resulting trust is very low.

use std::time::Duration;

use async_trait::async_trait;

use super::{clamp_unit, Collector, ConnectionQuality, LinkSpeed, PartialVerdict};
use crate::environment::{ConnectionType, HostEnvironment, NetworkInfo, ProbeError};

pub const BASE_TRUST: f64 = 0.5;
const LOW_TRUST: f64 = 0.3;
const FAST_FETCH: Duration = Duration::from_millis(100);
const MEDIUM_FETCH: Duration = Duration::from_millis(500);

/// Bonuses for link types; the collector and the trust evaluator weigh them differently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkWeights {
    pub wired_or_wifi: f64,
    pub cellular_fast: f64,
}

pub const COLLECTOR_LINK_WEIGHTS: LinkWeights = LinkWeights {
    wired_or_wifi: 0.2,
    cellular_fast: 0.1,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkAssessment {
    pub speed: LinkSpeed,
    pub trust_adjustment: f64,
}

impl Default for LinkAssessment {
    fn default() -> Self {
        Self {
            speed: LinkSpeed::Medium,
            trust_adjustment: 0.0,
        }
    }
}

/// Classifies a link from Network Information API data.
pub fn classify_network(info: &NetworkInfo, weights: LinkWeights) -> LinkAssessment {
    let mut assessment = LinkAssessment::default();

    match info.connection_type {
        Some(ConnectionType::Wifi) | Some(ConnectionType::Ethernet) => {
            assessment.speed = LinkSpeed::Fast;
            assessment.trust_adjustment += weights.wired_or_wifi;
        }
        Some(ConnectionType::Cellular) => match info.effective_type.as_deref() {
            Some("4g") | Some("5g") => {
                assessment.speed = LinkSpeed::Fast;
                assessment.trust_adjustment += weights.cellular_fast;
            }
            Some("3g") => assessment.speed = LinkSpeed::Medium,
            Some(_) => {
                assessment.speed = LinkSpeed::Slow;
                assessment.trust_adjustment -= 0.1;
            }
            None => {}
        },
        Some(ConnectionType::None) | Some(ConnectionType::Unknown) => {
            assessment.speed = LinkSpeed::Slow;
            assessment.trust_adjustment -= 0.2;
        }
        _ => {}
    }

    if info.save_data {
        assessment.trust_adjustment -= 0.1;
    }

    assessment
}

/// Classifies a link from the time a tiny fetch took.
pub fn classify_fetch(elapsed: Duration) -> LinkAssessment {
    if elapsed < FAST_FETCH {
        LinkAssessment {
            speed: LinkSpeed::Fast,
            trust_adjustment: 0.1,
        }
    } else if elapsed < MEDIUM_FETCH {
        LinkAssessment::default()
    } else {
        LinkAssessment {
            speed: LinkSpeed::Slow,
            trust_adjustment: -0.1,
        }
    }
}

/// Network info when the host exposes it, otherwise a measured fetch. A host that can
/// measure neither yields a neutral medium link.
pub async fn assess_link(
    env: &dyn HostEnvironment,
    weights: LinkWeights,
) -> Result<LinkAssessment, ProbeError> {
    if let Some(info) = env.network_info()? {
        return Ok(classify_network(&info, weights));
    }
    match env.measure_fetch().await {
        Ok(elapsed) => Ok(classify_fetch(elapsed)),
        Err(ProbeError::Unavailable) => Ok(LinkAssessment::default()),
        Err(err) => Err(err),
    }
}

pub fn quality_from(assessment: LinkAssessment, secure: bool) -> ConnectionQuality {
    let mut trust = BASE_TRUST + assessment.trust_adjustment;
    if secure {
        trust += 0.2;
    } else {
        trust -= 0.3;
    }
    ConnectionQuality {
        speed: assessment.speed,
        secure,
        trust_score: clamp_unit(trust),
    }
}

pub struct ConnectionCollector;

#[async_trait]
impl Collector for ConnectionCollector {
    fn id(&self) -> &'static str {
        "connection-quality"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        let secure = env.is_secure_transport();
        match assess_link(env, COLLECTOR_LINK_WEIGHTS).await {
            Ok(assessment) => {
                let quality = quality_from(assessment, secure);
                if quality.trust_score < LOW_TRUST {
                    PartialVerdict::scored(0.6, 0.7, "connection-quality")
                        .with_reason("Suspicious connection quality")
                        .with_connection_quality(quality)
                } else {
                    PartialVerdict::scored(0.0, 0.7, "connection-quality")
                        .with_connection_quality(quality)
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "connection quality probe failed");
                PartialVerdict::scored(0.1, 0.3, "connection-quality-error")
                    .with_reason("Connection quality check failed")
                    .with_connection_quality(ConnectionQuality {
                        speed: LinkSpeed::Medium,
                        secure,
                        trust_score: 0.4,
                    })
            }
        }
    }
}
