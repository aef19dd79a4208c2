// src/detection/mod.rs
// Aggregation of partial verdicts into one bot-likelihood result, with a global timeout
// over the whole collector fan-out.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GateConfig;
use crate::environment::HostEnvironment;
use crate::signals::{clamp_unit, default_collectors, Collector, ConnectionQuality, PartialVerdict};

/// Score reported when no collector produced a usable weight.
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// 0 is human, 1 is automated.
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    /// Comma-joined identifiers of the collectors that contributed a weighted score.
    pub method: String,
    pub connection_quality: Option<ConnectionQuality>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("detection timed out after {timeout:?} with {settled} of {total} collectors settled")]
    Timeout {
        timeout: Duration,
        settled: usize,
        total: usize,
    },
}

/// Running confidence-weighted fold over settled verdicts.
#[derive(Debug, Clone)]
pub struct VerdictAccumulator {
    collector_count: usize,
    weighted_score: f64,
    total_confidence: f64,
    reasons: Vec<String>,
    methods: Vec<String>,
    connection_quality: Option<ConnectionQuality>,
    settled: usize,
}

impl VerdictAccumulator {
    pub fn new(collector_count: usize) -> Self {
        Self {
            collector_count,
            weighted_score: 0.0,
            total_confidence: 0.0,
            reasons: Vec::new(),
            methods: Vec::new(),
            connection_quality: None,
            settled: 0,
        }
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    /// Folds one verdict. `fallback_method` names the collector when the verdict does not.
    pub fn add(&mut self, fallback_method: &str, verdict: PartialVerdict) {
        self.settled += 1;

        let mut contributed = false;
        if let (Some(score), Some(confidence)) = (verdict.score, verdict.confidence) {
            if score.is_finite() && confidence.is_finite() {
                let score = clamp_unit(score);
                let confidence = clamp_unit(confidence);
                self.weighted_score += score * confidence;
                self.total_confidence += confidence;
                contributed = true;
            }
        }

        self.reasons.extend(verdict.reasons);
        // Only collectors that carried weight are named.
        if contributed {
            self.methods.push(
                verdict
                    .method
                    .unwrap_or_else(|| fallback_method.to_string()),
            );
        }
        if verdict.connection_quality.is_some() {
            self.connection_quality = verdict.connection_quality;
        }
    }

    pub fn finish(self) -> DetectionResult {
        let score = if self.total_confidence > 0.0 {
            self.weighted_score / self.total_confidence
        } else {
            NEUTRAL_SCORE
        };
        let confidence = if self.collector_count == 0 {
            0.0
        } else {
            (self.total_confidence / self.collector_count as f64).min(1.0)
        };

        DetectionResult {
            score: clamp_unit(score),
            confidence: clamp_unit(confidence),
            reasons: self.reasons,
            method: self.methods.join(", "),
            connection_quality: self.connection_quality,
        }
    }
}

pub struct Aggregator {
    collectors: Vec<Box<dyn Collector>>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(collectors: Vec<Box<dyn Collector>>, timeout: Duration) -> Self {
        Self {
            collectors,
            timeout,
        }
    }

    /// All built-in collectors under the configured timeout.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(default_collectors(), config.timeout())
    }

    pub fn push(&mut self, collector: Box<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pure fold over already-settled verdicts.
    pub fn aggregate<I>(verdicts: I, collector_count: usize) -> DetectionResult
    where
        I: IntoIterator<Item = PartialVerdict>,
    {
        let mut accumulator = VerdictAccumulator::new(collector_count);
        for (index, verdict) in verdicts.into_iter().enumerate() {
            accumulator.add(&format!("method-{index}"), verdict);
        }
        accumulator.finish()
    }

    /// Runs every collector concurrently on the current task. Panicking collectors
    /// abstain; collectors still pending when the timeout fires are dropped.
    pub async fn run(&self, env: &dyn HostEnvironment) -> Result<DetectionResult, DetectionError> {
        self.run_with(env, &[]).await
    }

    /// Like `run`, with `extra` collectors joining this cycle only. They count toward the
    /// confidence denominator for this cycle alone.
    pub async fn run_with(
        &self,
        env: &dyn HostEnvironment,
        extra: &[&dyn Collector],
    ) -> Result<DetectionResult, DetectionError> {
        let collectors: Vec<&dyn Collector> = self
            .collectors
            .iter()
            .map(|collector| collector.as_ref() as &dyn Collector)
            .chain(extra.iter().map(|collector| *collector as &dyn Collector))
            .collect();
        let total = collectors.len();
        let mut accumulator = VerdictAccumulator::new(total);

        let mut in_flight: FuturesUnordered<_> = collectors
            .iter()
            .map(|collector| {
                let id = collector.id();
                AssertUnwindSafe(collector.collect(env))
                    .catch_unwind()
                    .map(move |outcome| (id, outcome))
            })
            .collect();

        let drain = async {
            while let Some((id, outcome)) = in_flight.next().await {
                match outcome {
                    Ok(verdict) => {
                        tracing::debug!(
                            collector = id,
                            score = ?verdict.score,
                            confidence = ?verdict.confidence,
                            "collector settled"
                        );
                        accumulator.add(id, verdict);
                    }
                    Err(_) => {
                        tracing::warn!(collector = id, "collector panicked; counting as abstention");
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, drain).await {
            Ok(()) => Ok(accumulator.finish()),
            Err(_) => {
                let settled = accumulator.settled();
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    settled,
                    total,
                    "bot detection timed out"
                );
                Err(DetectionError::Timeout {
                    timeout: self.timeout,
                    settled,
                    total,
                })
            }
        }
    }
}
