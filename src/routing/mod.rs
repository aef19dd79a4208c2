// src/routing/mod.rs
// Routing state machine: decides bot page, challenge or human page from the cache,
// the connection trust and the detection result. Pure and synchronous; `Gateway`
// drives it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GateConfig;
use crate::detection::DetectionResult;
use crate::signals::LinkSpeed;
use crate::trust::ConnectionTrust;

mod gateway;

pub use gateway::{Gateway, GatewayReport};

const CHALLENGE_PASS_TRUST_BONUS: f64 = 0.1;
const CHALLENGE_FAIL_TRUST_PENALTY: f64 = 0.3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BotReason {
    /// Insecure transport, or trust too low for the link.
    ForcedOverride,
    ScoreThreshold,
    ChallengeFailed,
    ChallengeSkipped,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HumanReason {
    CachedVerification,
    TrustedConnection,
    LowScore,
    ChallengePassed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Bot(BotReason),
    Human(HumanReason),
}

impl Outcome {
    pub fn destination(self) -> Destination {
        match self {
            Outcome::Bot(_) => Destination::BotPage,
            Outcome::Human(_) => Destination::HumanPage,
        }
    }

    fn settled(self) -> RoutingState {
        match self {
            Outcome::Bot(reason) => RoutingState::Bot { reason },
            Outcome::Human(reason) => RoutingState::Human { reason },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    BotPage,
    HumanPage,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoutingState {
    Analyzing,
    Challenge { failed_attempts: u8 },
    Redirecting { outcome: Outcome },
    Bot { reason: BotReason },
    Human { reason: HumanReason },
}

impl RoutingState {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingState::Analyzing => "analyzing",
            RoutingState::Challenge { .. } => "challenge",
            RoutingState::Redirecting { .. } => "redirecting",
            RoutingState::Bot { .. } => "bot",
            RoutingState::Human { .. } => "human",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoutingState::Bot { .. } | RoutingState::Human { .. })
    }

    pub fn destination(&self) -> Option<Destination> {
        match self {
            RoutingState::Redirecting { outcome } => Some(outcome.destination()),
            RoutingState::Bot { .. } => Some(Destination::BotPage),
            RoutingState::Human { .. } => Some(Destination::HumanPage),
            RoutingState::Analyzing | RoutingState::Challenge { .. } => None,
        }
    }

    pub fn stage(&self) -> LoadingStage {
        match self {
            RoutingState::Analyzing => LoadingStage::Analyzing,
            RoutingState::Challenge { .. } => LoadingStage::Verifying,
            RoutingState::Redirecting { .. } => LoadingStage::Redirecting,
            RoutingState::Bot { .. } | RoutingState::Human { .. } => LoadingStage::Complete,
        }
    }
}

/// Coarse progress shown by the loading screen.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStage {
    Analyzing,
    Verifying,
    Redirecting,
    Complete,
}

impl LoadingStage {
    pub fn progress(self) -> u8 {
        match self {
            LoadingStage::Analyzing => 25,
            LoadingStage::Verifying => 50,
            LoadingStage::Redirecting => 90,
            LoadingStage::Complete => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            LoadingStage::Analyzing => "Analyzing connection...",
            LoadingStage::Verifying => "Verifying you are human...",
            LoadingStage::Redirecting => "Redirecting...",
            LoadingStage::Complete => "Done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("cannot handle {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RoutingState,
    pub to: RoutingState,
    /// The visitor just proved human and the verification cache should be written.
    pub record_verification: bool,
}

pub struct RoutingMachine {
    config: GateConfig,
    state: RoutingState,
    trust_score: Option<f64>,
}

impl RoutingMachine {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            config: config.clone(),
            state: RoutingState::Analyzing,
            trust_score: None,
        }
    }

    pub fn state(&self) -> RoutingState {
        self.state
    }

    /// Trust score of the current cycle, including challenge adjustments.
    pub fn trust_score(&self) -> Option<f64> {
        self.trust_score
    }

    pub fn reset(&mut self) {
        self.state = RoutingState::Analyzing;
        self.trust_score = None;
    }

    fn transition(&mut self, to: RoutingState, record_verification: bool) -> Transition {
        let from = self.state;
        self.state = to;
        Transition {
            from,
            to,
            record_verification,
        }
    }

    fn invalid(&self, event: &'static str) -> RoutingError {
        RoutingError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }

    fn redirect(&mut self, outcome: Outcome) -> Transition {
        let record = matches!(
            outcome,
            Outcome::Human(HumanReason::LowScore) | Outcome::Human(HumanReason::ChallengePassed)
        );
        self.transition(RoutingState::Redirecting { outcome }, record)
    }

    pub fn on_cache_hit(&mut self) -> Result<Transition, RoutingError> {
        if self.state != RoutingState::Analyzing {
            return Err(self.invalid("cache hit"));
        }
        Ok(self.redirect(Outcome::Human(HumanReason::CachedVerification)))
    }

    /// Bypasses detection when the connection is trusted and not anonymized.
    pub fn on_trust(&mut self, trust: &ConnectionTrust) -> Result<Option<Transition>, RoutingError> {
        if self.state != RoutingState::Analyzing {
            return Err(self.invalid("connection trust"));
        }
        self.trust_score = Some(trust.trust_score);
        if !trust.skip_bot_check {
            return Ok(None);
        }
        Ok(Some(self.redirect(Outcome::Human(HumanReason::TrustedConnection))))
    }

    fn forced_bot(&self, result: &DetectionResult, trust: &ConnectionTrust) -> bool {
        let quality = result.connection_quality.as_ref();
        let insecure = !trust.secure || quality.map_or(false, |q| !q.secure);
        let slow = trust.speed == LinkSpeed::Slow
            || quality.map_or(false, |q| q.speed == LinkSpeed::Slow);

        insecure
            || trust.trust_score < self.config.force_bot_trust_floor
            || (slow && trust.trust_score < self.config.slow_link_trust_floor)
    }

    fn challenge_skipped(&self, result: &DetectionResult, trust: &ConnectionTrust) -> bool {
        if !self.config.skip_verification_for_trusted_connections {
            return false;
        }
        let quality_trusted = result.connection_quality.as_ref().map_or(false, |q| {
            q.secure && q.trust_score >= self.config.connection_trust_threshold
        });
        trust.skip_challenge || quality_trusted
    }

    /// Applies the forced override, then the bot threshold, then the challenge threshold.
    pub fn on_detection(
        &mut self,
        result: &DetectionResult,
        trust: &ConnectionTrust,
    ) -> Result<Transition, RoutingError> {
        if self.state != RoutingState::Analyzing {
            return Err(self.invalid("detection result"));
        }
        self.trust_score = Some(trust.trust_score);

        if self.forced_bot(result, trust) {
            return Ok(self.redirect(Outcome::Bot(BotReason::ForcedOverride)));
        }
        if result.score >= self.config.bot_threshold {
            return Ok(self.redirect(Outcome::Bot(BotReason::ScoreThreshold)));
        }
        if result.score >= self.config.challenge_threshold && !self.challenge_skipped(result, trust) {
            return Ok(self.transition(RoutingState::Challenge { failed_attempts: 0 }, false));
        }
        Ok(self.redirect(Outcome::Human(HumanReason::LowScore)))
    }

    /// Detection could not finish; let the visitor prove themselves.
    pub fn on_detection_failed(&mut self) -> Result<Transition, RoutingError> {
        if self.state != RoutingState::Analyzing {
            return Err(self.invalid("detection failure"));
        }
        Ok(self.transition(RoutingState::Challenge { failed_attempts: 0 }, false))
    }

    pub fn on_challenge_success(&mut self) -> Result<Transition, RoutingError> {
        if !matches!(self.state, RoutingState::Challenge { .. }) {
            return Err(self.invalid("challenge success"));
        }
        self.trust_score = self
            .trust_score
            .map(|score| (score + CHALLENGE_PASS_TRUST_BONUS).min(1.0));
        Ok(self.redirect(Outcome::Human(HumanReason::ChallengePassed)))
    }

    pub fn on_challenge_failure(&mut self) -> Result<Transition, RoutingError> {
        let RoutingState::Challenge { failed_attempts } = self.state else {
            return Err(self.invalid("challenge failure"));
        };
        let failed_attempts = failed_attempts.saturating_add(1);
        if failed_attempts >= self.config.challenge_max_attempts {
            self.trust_score = self
                .trust_score
                .map(|score| (score - CHALLENGE_FAIL_TRUST_PENALTY).max(0.0));
            return Ok(self.redirect(Outcome::Bot(BotReason::ChallengeFailed)));
        }
        Ok(self.transition(RoutingState::Challenge { failed_attempts }, false))
    }

    pub fn on_challenge_skipped(&mut self) -> Result<Transition, RoutingError> {
        if !matches!(self.state, RoutingState::Challenge { .. }) {
            return Err(self.invalid("challenge skip"));
        }
        Ok(self.redirect(Outcome::Bot(BotReason::ChallengeSkipped)))
    }

    /// Completes a pending redirect.
    pub fn settle(&mut self) -> Result<Transition, RoutingError> {
        let RoutingState::Redirecting { outcome } = self.state else {
            return Err(self.invalid("settle"));
        };
        Ok(self.transition(outcome.settled(), false))
    }

    /// Sets any state directly. Meant for manual testing of the pages.
    pub fn force(&mut self, state: RoutingState) -> Transition {
        tracing::warn!(from = self.state.name(), to = state.name(), "routing state forced");
        self.transition(state, false)
    }
}
