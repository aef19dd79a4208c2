// src/signals/navigator.rs
// Navigator properties: device memory, cores, service workers, languages and cookies.
// Also emits a medium-speed connection quality carrying the derived trust.

use async_trait::async_trait;

use super::{clamp_unit, Collector, ConnectionQuality, LinkSpeed, PartialVerdict};
use crate::environment::{HostEnvironment, NavigatorInfo};

const SUSPICIOUS_TRUST: f64 = 0.3;

/// Returns the navigator trust estimate and any reasons it was lowered.
pub fn navigator_trust(info: &NavigatorInfo) -> (f64, f64, Vec<String>) {
    let mut reasons = Vec::new();
    let mut trust = 0.5;
    let mut score = 0.0;

    if let Some(memory) = info.device_memory_gb {
        if memory < 2.0 {
            trust -= 0.1;
        } else if memory > 4.0 {
            trust += 0.1;
        }
    }

    if let Some(cores) = info.hardware_concurrency {
        if cores < 2 {
            trust -= 0.1;
            reasons.push("Suspiciously low CPU cores".to_string());
        } else if cores > 4 {
            trust += 0.1;
        }
    }

    if info.service_worker {
        trust += 0.1;
    } else {
        trust -= 0.2;
        reasons.push("No service worker support".to_string());
    }

    if !info.languages.is_empty() {
        trust += 0.1;
    } else if info.language.as_deref().map_or(true, str::is_empty) {
        trust -= 0.2;
        score += 0.3;
        reasons.push("Missing language settings".to_string());
    }

    if info.cookie_enabled {
        trust += 0.1;
    } else {
        trust -= 0.1;
        reasons.push("Cookies disabled".to_string());
    }

    (score, trust, reasons)
}

pub fn score_navigator(info: &NavigatorInfo, secure: bool) -> PartialVerdict {
    let (mut score, trust, mut reasons) = navigator_trust(info);
    if trust < SUSPICIOUS_TRUST {
        score += 0.4;
        reasons.push("Suspicious navigator properties".to_string());
    }
    PartialVerdict::scored(score, 0.6, "navigator-properties")
        .with_reasons(reasons)
        .with_connection_quality(ConnectionQuality {
            speed: LinkSpeed::Medium,
            secure,
            trust_score: clamp_unit(trust),
        })
}

pub struct NavigatorCollector;

#[async_trait]
impl Collector for NavigatorCollector {
    fn id(&self) -> &'static str {
        "navigator-properties"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.navigator() {
            Ok(info) => score_navigator(&info, env.is_secure_transport()),
            Err(err) => {
                tracing::debug!(error = %err, "navigator probe failed");
                PartialVerdict::scored(0.1, 0.3, "navigator-properties-error")
                    .with_reason("Navigator properties check failed")
            }
        }
    }
}
