// src/signals/pointer.rs
// Pointer activity over a short passive window. Humans often have not moved yet, so the
// penalty and confidence are both small.

use std::time::Duration;

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::{HostEnvironment, PointerActivity};

const OBSERVATION_WINDOW: Duration = Duration::from_millis(100);

pub struct PointerCollector {
    window: Duration,
}

impl Default for PointerCollector {
    fn default() -> Self {
        Self {
            window: OBSERVATION_WINDOW,
        }
    }
}

pub fn score_activity(activity: &PointerActivity) -> PartialVerdict {
    if activity.is_idle() {
        return PartialVerdict::scored(0.2, 0.3, "mouse-behavior")
            .with_reason("No mouse activity detected");
    }
    PartialVerdict::scored(0.0, 0.3, "mouse-behavior")
}

#[async_trait]
impl Collector for PointerCollector {
    fn id(&self) -> &'static str {
        "mouse-behavior"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.pointer_activity(self.window).await {
            Ok(activity) => score_activity(&activity),
            Err(err) => {
                tracing::debug!(error = %err, "pointer probe unavailable; abstaining");
                PartialVerdict::abstain("mouse-behavior")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::score_activity;
    use crate::environment::PointerActivity;

    #[test]
    fn any_movement_or_click_clears_the_penalty() {
        let moved = PointerActivity { moves: 3, clicks: 0 };
        let clicked = PointerActivity { moves: 0, clicks: 1 };
        assert_eq!(score_activity(&moved).score, Some(0.0));
        assert_eq!(score_activity(&clicked).score, Some(0.0));
    }

    #[test]
    fn idle_pointer_gets_small_low_confidence_penalty() {
        let verdict = score_activity(&PointerActivity::default());
        assert_eq!(verdict.score, Some(0.2));
        assert_eq!(verdict.confidence, Some(0.3));
    }
}
