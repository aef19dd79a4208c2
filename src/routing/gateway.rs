// src/routing/gateway.rs
// Async driver for one evaluation cycle: cache, trust, detection, decision, cache write.

use std::sync::Arc;

use serde::Serialize;

use super::{Destination, LoadingStage, RoutingError, RoutingMachine, RoutingState, Transition};
use crate::cache::VerificationCache;
use crate::config::GateConfig;
use crate::detection::{Aggregator, DetectionResult};
use crate::environment::HostEnvironment;
use crate::signals::Collector;
use crate::store::KeyValueStore;
use crate::test_mode::{self, ScenarioCollector, TestScenario};
use crate::trust::{ConnectionTrust, TrustEvaluator};

/// Diagnostic snapshot of the gateway.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GatewayReport {
    pub state: RoutingState,
    pub stage: LoadingStage,
    pub progress: u8,
    pub destination: Option<Destination>,
    pub trust_score: Option<f64>,
    pub detection: Option<DetectionResult>,
    pub trust: Option<ConnectionTrust>,
    pub detection_error: Option<String>,
    pub scenario: Option<TestScenario>,
}

pub struct Gateway {
    config: GateConfig,
    env: Arc<dyn HostEnvironment>,
    store: Arc<dyn KeyValueStore>,
    aggregator: Aggregator,
    scenario_collector: Option<ScenarioCollector>,
    trust_evaluator: TrustEvaluator,
    machine: RoutingMachine,
    last_detection: Option<DetectionResult>,
    last_trust: Option<ConnectionTrust>,
    last_error: Option<String>,
}

impl Gateway {
    pub fn new(
        config: GateConfig,
        env: Arc<dyn HostEnvironment>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let aggregator = Aggregator::from_config(&config);
        Self::with_aggregator(config, env, store, aggregator)
    }

    /// Uses a custom collector set. In test mode the scenario collector joins a cycle only
    /// while the bot-signals scenario is active.
    pub fn with_aggregator(
        config: GateConfig,
        env: Arc<dyn HostEnvironment>,
        store: Arc<dyn KeyValueStore>,
        aggregator: Aggregator,
    ) -> Self {
        let scenario_collector = config
            .test_mode
            .then(|| ScenarioCollector::new(store.clone()));
        Self {
            scenario_collector,
            trust_evaluator: TrustEvaluator::new(&config),
            machine: RoutingMachine::new(&config),
            config,
            env,
            store,
            aggregator,
            last_detection: None,
            last_trust: None,
            last_error: None,
        }
    }

    fn cache(&self) -> VerificationCache<'_> {
        VerificationCache::from_config(self.store.as_ref(), &self.config)
    }

    fn apply(&mut self, outcome: Result<Transition, RoutingError>) {
        match outcome {
            Ok(transition) => {
                tracing::info!(
                    from = transition.from.name(),
                    to = transition.to.name(),
                    "routing transition"
                );
                if transition.record_verification {
                    self.cache().write(true);
                }
                if matches!(transition.to, RoutingState::Redirecting { .. }) {
                    let settled = self.machine.settle();
                    self.apply(settled);
                }
            }
            Err(err) => tracing::warn!(error = %err, "ignoring routing event"),
        }
    }

    /// Runs a full evaluation cycle from `Analyzing` and returns the resulting state.
    pub async fn run(&mut self) -> RoutingState {
        self.machine.reset();
        self.last_detection = None;
        self.last_trust = None;
        self.last_error = None;

        if self.cache().read() {
            let hit = self.machine.on_cache_hit();
            self.apply(hit);
            return self.state();
        }

        let trust = self
            .trust_evaluator
            .evaluate(self.env.as_ref(), Some(self.store.as_ref()))
            .await;
        let bypass = self.machine.on_trust(&trust);
        self.last_trust = Some(trust.clone());
        match bypass {
            Ok(Some(transition)) => {
                self.apply(Ok(transition));
                return self.state();
            }
            Ok(None) => {}
            Err(err) => {
                self.apply(Err(err));
                return self.state();
            }
        }

        let mut extra: Vec<&dyn Collector> = Vec::new();
        if let Some(collector) = &self.scenario_collector {
            if test_mode::active_flags(self.store.as_ref()).bot_signals {
                extra.push(collector);
            }
        }

        match self.aggregator.run_with(self.env.as_ref(), &extra).await {
            Ok(result) => {
                tracing::debug!(
                    score = result.score,
                    confidence = result.confidence,
                    method = %result.method,
                    "bot detection finished"
                );
                let decision = self.machine.on_detection(&result, &trust);
                self.last_detection = Some(result);
                self.apply(decision);
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                let fallback = self.machine.on_detection_failed();
                self.apply(fallback);
            }
        }

        self.state()
    }

    /// Drops any cached verification and evaluates again from scratch.
    pub async fn retry_detection(&mut self) -> RoutingState {
        self.cache().clear();
        self.run().await
    }

    pub fn challenge_succeeded(&mut self) -> RoutingState {
        let outcome = self.machine.on_challenge_success();
        self.apply(outcome);
        self.state()
    }

    pub fn challenge_failed(&mut self) -> RoutingState {
        let outcome = self.machine.on_challenge_failure();
        self.apply(outcome);
        self.state()
    }

    pub fn challenge_skipped(&mut self) -> RoutingState {
        let outcome = self.machine.on_challenge_skipped();
        self.apply(outcome);
        self.state()
    }

    /// Manual override for exercising the pages. Nothing is cached.
    pub fn force_state(&mut self, state: RoutingState) -> RoutingState {
        self.machine.force(state);
        self.state()
    }

    pub fn state(&self) -> RoutingState {
        self.machine.state()
    }

    pub fn stage(&self) -> LoadingStage {
        self.state().stage()
    }

    pub fn progress(&self) -> u8 {
        self.stage().progress()
    }

    pub fn destination(&self) -> Option<Destination> {
        self.state().destination()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn trust(&self) -> Option<&ConnectionTrust> {
        self.last_trust.as_ref()
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.last_detection.as_ref()
    }

    pub fn debug_report(&self) -> GatewayReport {
        let state = self.state();
        GatewayReport {
            state,
            stage: state.stage(),
            progress: state.stage().progress(),
            destination: state.destination(),
            trust_score: self.machine.trust_score(),
            detection: self.last_detection.clone(),
            trust: self.last_trust.clone(),
            detection_error: self.last_error.clone(),
            scenario: self
                .config
                .test_mode
                .then(|| test_mode::current(self.store.as_ref())),
        }
    }
}
