// src/signals/viewport.rs
// Display geometry checks.

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::{DisplayGeometry, HostEnvironment};

/// Screen resolutions automation frameworks default to.
pub const AUTOMATION_RESOLUTIONS: &[(u32, u32)] = &[(1024, 768), (800, 600), (1280, 1024)];

pub fn score_geometry(geometry: &DisplayGeometry) -> PartialVerdict {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if geometry.outer_width == 0 || geometry.outer_height == 0 {
        score += 0.6;
        reasons.push("Zero viewport dimensions".to_string());
    }

    // A browser with chrome always has an outer window larger than the viewport.
    if geometry.inner_width == geometry.outer_width
        && geometry.inner_height == geometry.outer_height
    {
        score += 0.4;
        reasons.push("Suspicious viewport equality".to_string());
    }

    if geometry.screen_width == 0 || geometry.screen_height == 0 {
        score += 0.7;
        reasons.push("Invalid screen dimensions".to_string());
    }

    if AUTOMATION_RESOLUTIONS.contains(&(geometry.screen_width, geometry.screen_height)) {
        score += 0.2;
        reasons.push("Common bot screen resolution".to_string());
    }

    PartialVerdict::scored(score, 0.6, "viewport").with_reasons(reasons)
}

pub struct ViewportCollector;

#[async_trait]
impl Collector for ViewportCollector {
    fn id(&self) -> &'static str {
        "viewport"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.display() {
            Ok(geometry) => score_geometry(&geometry),
            Err(err) => {
                tracing::debug!(error = %err, "display probe failed; abstaining");
                PartialVerdict::abstain("viewport")
            }
        }
    }
}
