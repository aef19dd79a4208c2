// src/signals/canvas.rs
// Rendering-surface fingerprint: the offscreen 2D drawing must produce a real image
// that is not one of the known default renderings.

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::HostEnvironment;

/// Data-URL prefixes produced by stubbed or default headless canvases.
pub const KNOWN_DEFAULT_FINGERPRINTS: &[&str] = &[
    "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAASwAAACWCAYAAABkW7XSAAAEYklEQVR4Xu3UAQkAAAwCwdm/9HI83BLIOdw5AgQIRAQWySkmAQIEzmAl",
];

const EMPTY_DATA_URL: &str = "data:,";
const MIN_FINGERPRINT_LEN: usize = 100;

pub fn score_fingerprint(fingerprint: &str) -> PartialVerdict {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if fingerprint == EMPTY_DATA_URL || fingerprint.len() < MIN_FINGERPRINT_LEN {
        score += 0.8;
        reasons.push("Invalid or empty canvas fingerprint".to_string());
    }

    if KNOWN_DEFAULT_FINGERPRINTS
        .iter()
        .any(|known| fingerprint.starts_with(known))
    {
        score += 0.6;
        reasons.push("Common bot canvas fingerprint detected".to_string());
    }

    PartialVerdict::scored(score, 0.9, "canvas-fingerprint").with_reasons(reasons)
}

pub struct CanvasCollector;

#[async_trait]
impl Collector for CanvasCollector {
    fn id(&self) -> &'static str {
        "canvas-fingerprint"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.canvas_fingerprint() {
            Ok(Some(fingerprint)) => score_fingerprint(&fingerprint),
            Ok(None) => PartialVerdict::scored(0.4, 0.5, "canvas-unavailable")
                .with_reason("Canvas context not available"),
            Err(err) => {
                tracing::debug!(error = %err, "canvas probe failed");
                PartialVerdict::scored(0.5, 0.3, "canvas-error")
                    .with_reason("Canvas fingerprinting failed")
            }
        }
    }
}
