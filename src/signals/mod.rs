// src/signals/mod.rs
// Signal collectors: independent probes that each inspect one facet of the visitor's
// environment and return a partial bot-likelihood verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::environment::HostEnvironment;

pub mod canvas;
pub mod connection;
pub mod dom;
pub mod execution;
pub mod navigator;
pub mod pointer;
pub mod storage;
pub mod timing;
pub mod user_agent;
pub mod viewport;
pub mod webgl;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkSpeed {
    Slow,
    Medium,
    Fast,
}

impl LinkSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkSpeed::Slow => "slow",
            LinkSpeed::Medium => "medium",
            LinkSpeed::Fast => "fast",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ConnectionQuality {
    pub speed: LinkSpeed,
    pub secure: bool,
    pub trust_score: f64,
}

/// One collector's contribution. A `None` field abstains on that dimension.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PartialVerdict {
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub method: Option<String>,
    pub connection_quality: Option<ConnectionQuality>,
}

impl PartialVerdict {
    pub fn scored(score: f64, confidence: f64, method: &str) -> Self {
        Self {
            score: Some(score),
            confidence: Some(confidence),
            reasons: Vec::new(),
            method: Some(method.to_string()),
            connection_quality: None,
        }
    }

    /// Contributes nothing to the score.
    pub fn abstain(method: &str) -> Self {
        Self {
            method: Some(method.to_string()),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons.extend(reasons);
        self
    }

    pub fn with_connection_quality(mut self, quality: ConnectionQuality) -> Self {
        self.connection_quality = Some(quality);
        self
    }

    pub fn is_abstention(&self) -> bool {
        self.score.is_none() || self.confidence.is_none()
    }
}

/// A single heuristic probe. Implementations must not panic on probe failure; they map
/// `ProbeError`s to a penalty verdict or an abstention themselves.
#[async_trait]
pub trait Collector: Send + Sync {
    fn id(&self) -> &'static str;

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict;
}

/// All built-in collectors in their canonical order.
pub fn default_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(user_agent::UserAgentCollector),
        Box::new(execution::ExecutionCollector),
        Box::new(canvas::CanvasCollector),
        Box::new(webgl::WebGlCollector),
        Box::new(viewport::ViewportCollector),
        Box::new(timing::TimingCollector::default()),
        Box::new(dom::DomCollector),
        Box::new(storage::StorageCollector),
        Box::new(pointer::PointerCollector::default()),
        Box::new(connection::ConnectionCollector),
        Box::new(navigator::NavigatorCollector),
    ]
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{default_collectors, PartialVerdict};

    #[test]
    fn default_collectors_have_unique_ids_in_canonical_order() {
        let ids: Vec<&str> = default_collectors().iter().map(|c| c.id()).collect();
        assert_eq!(
            ids,
            vec![
                "user-agent",
                "javascript-execution",
                "canvas-fingerprint",
                "webgl",
                "viewport",
                "timing",
                "dom-manipulation",
                "local-storage",
                "mouse-behavior",
                "connection-quality",
                "navigator-properties",
            ]
        );
    }

    #[test]
    fn abstention_has_no_score_or_confidence() {
        let verdict = PartialVerdict::abstain("timing");
        assert!(verdict.is_abstention());
        assert_eq!(verdict.method.as_deref(), Some("timing"));
        assert!(!PartialVerdict::scored(0.0, 0.4, "timing").is_abstention());
    }
}
