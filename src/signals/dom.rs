// src/signals/dom.rs
// DOM mutability: a styled throwaway element must show its style in the computed view.

use async_trait::async_trait;

use super::{Collector, PartialVerdict};
use crate::environment::{DomProbe, HostEnvironment};

const EXPECTED_WIDTH: &str = "1px";

pub fn score_dom_probe(probe: &DomProbe) -> PartialVerdict {
    if probe.computed_width.trim() == EXPECTED_WIDTH {
        return PartialVerdict::scored(0.0, 0.7, "dom-manipulation");
    }
    PartialVerdict::scored(0.5, 0.7, "dom-manipulation")
        .with_reason("Cannot properly manipulate DOM")
}

pub struct DomCollector;

#[async_trait]
impl Collector for DomCollector {
    fn id(&self) -> &'static str {
        "dom-manipulation"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        match env.dom_probe() {
            Ok(probe) => score_dom_probe(&probe),
            Err(err) => {
                tracing::debug!(error = %err, "dom probe failed");
                PartialVerdict::scored(0.6, 0.5, "dom-error")
                    .with_reason("DOM manipulation test failed")
            }
        }
    }
}
