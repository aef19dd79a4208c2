// src/signals/execution.rs
// Execution-environment sanity: expected host APIs present, and the probe not finishing
// implausibly fast.

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::{HostCapabilities, HostEnvironment};

const MISSING_CAPABILITY_WEIGHT: f64 = 0.6;
const FAST_PROBE_WEIGHT: f64 = 0.3;
const FAST_PROBE_US: u64 = 100;
const CONFIDENCE: f64 = 0.8;

pub fn score_capabilities(capabilities: &HostCapabilities) -> PartialVerdict {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    let missing = capabilities.missing_count();
    if missing > 0 {
        score += MISSING_CAPABILITY_WEIGHT;
        reasons.push(format!("Failed {missing} JavaScript tests"));
    }

    if matches!(capabilities.probe_cost_us, Some(cost) if cost < FAST_PROBE_US) {
        score += FAST_PROBE_WEIGHT;
        reasons.push("Suspiciously fast JavaScript execution".to_string());
    }

    PartialVerdict::scored(score, CONFIDENCE, "javascript-execution").with_reasons(reasons)
}

pub struct ExecutionCollector;

#[async_trait]
impl Collector for ExecutionCollector {
    fn id(&self) -> &'static str {
        "javascript-execution"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        score_capabilities(&env.capabilities())
    }
}

#[cfg(test)]
mod tests {
    use super::score_capabilities;
    use crate::environment::HostCapabilities;

    #[test]
    fn complete_host_with_realistic_cost_is_clean() {
        let caps = HostCapabilities {
            probe_cost_us: Some(250),
            ..HostCapabilities::default()
        };
        let verdict = score_capabilities(&caps);
        assert_eq!(verdict.score, Some(0.0));
        assert_eq!(verdict.confidence, Some(0.8));
    }

    #[test]
    fn missing_apis_and_instant_probe_both_count() {
        let caps = HostCapabilities {
            local_storage: false,
            session_storage: false,
            probe_cost_us: Some(20),
            ..HostCapabilities::default()
        };
        let verdict = score_capabilities(&caps);
        assert_eq!(verdict.score, Some(0.6 + 0.3));
        assert_eq!(verdict.reasons[0], "Failed 2 JavaScript tests");
    }

    #[test]
    fn unmeasured_probe_cost_is_not_penalised() {
        let verdict = score_capabilities(&HostCapabilities::default());
        assert_eq!(verdict.score, Some(0.0));
    }
}
