// src/signals/timing.rs
// Timer behaviour: awaiting a 1ms timer should cost real wall-clock time.

use std::time::Duration;

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::HostEnvironment;

const PROBE_DELAY: Duration = Duration::from_millis(1);
const SUSPICIOUS_BELOW: Duration = Duration::from_micros(500);

pub struct TimingCollector {
    delay: Duration,
}

impl Default for TimingCollector {
    fn default() -> Self {
        Self { delay: PROBE_DELAY }
    }
}

pub fn score_delay(measured: Duration) -> PartialVerdict {
    if measured < SUSPICIOUS_BELOW {
        return PartialVerdict::scored(0.3, 0.4, "timing")
            .with_reason("Suspiciously fast timing execution");
    }
    PartialVerdict::scored(0.0, 0.4, "timing")
}

#[async_trait]
impl Collector for TimingCollector {
    fn id(&self) -> &'static str {
        "timing"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.measure_delay(self.delay).await {
            Ok(measured) => score_delay(measured),
            Err(err) => {
                tracing::debug!(error = %err, "timer probe unavailable; abstaining");
                PartialVerdict::abstain("timing")
            }
        }
    }
}
