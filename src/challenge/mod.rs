// src/challenge/mod.rs
// Human verification widgets and their binding to the gateway. The widget judges
// answers; the gateway owns the attempt budget.

use serde::{Deserialize, Serialize};

use crate::cache::now_ms;
use crate::routing::{Gateway, RoutingState};

mod text;
mod token;

pub use text::{generate_code, normalize_answer, TextChallenge, CODE_ALPHABET, CODE_LENGTH};
pub use token::{ChallengeKey, ChallengePayload, TokenError, SECRET_ENV};

/// A freshly issued challenge: `code` goes to the renderer, `token` round-trips with the answer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub code: String,
    pub token: String,
    pub expires_at: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAttempt {
    Passed,
    Incorrect,
    Expired,
    InvalidToken,
}

pub trait ChallengeWidget {
    fn issue(&self, now_ms: u64) -> Result<IssuedChallenge, TokenError>;

    fn verify(&self, token: &str, answer: &str, now_ms: u64) -> ChallengeAttempt;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub attempt: ChallengeAttempt,
    pub state: RoutingState,
}

/// Drives one widget against a gateway sitting in `Challenge`.
pub struct ChallengeSession<W: ChallengeWidget> {
    widget: W,
    current: IssuedChallenge,
}

impl<W: ChallengeWidget> ChallengeSession<W> {
    pub fn new(widget: W) -> Result<Self, TokenError> {
        Self::new_at(widget, now_ms())
    }

    pub fn new_at(widget: W, now_ms: u64) -> Result<Self, TokenError> {
        let current = widget.issue(now_ms)?;
        Ok(Self { widget, current })
    }

    pub fn current(&self) -> &IssuedChallenge {
        &self.current
    }

    /// New code without spending an attempt.
    pub fn refresh_at(&mut self, now_ms: u64) -> Result<(), TokenError> {
        self.current = self.widget.issue(now_ms)?;
        Ok(())
    }

    pub fn submit(&mut self, gateway: &mut Gateway, answer: &str) -> SubmitOutcome {
        self.submit_at(gateway, answer, now_ms())
    }

    /// Judges `answer`; any failure costs one attempt and, while the gateway still
    /// challenges, rotates to a new code.
    pub fn submit_at(&mut self, gateway: &mut Gateway, answer: &str, now_ms: u64) -> SubmitOutcome {
        let attempt = self.widget.verify(&self.current.token, answer, now_ms);
        let state = match attempt {
            ChallengeAttempt::Passed => gateway.challenge_succeeded(),
            ChallengeAttempt::Incorrect | ChallengeAttempt::Expired | ChallengeAttempt::InvalidToken => {
                let state = gateway.challenge_failed();
                if matches!(state, RoutingState::Challenge { .. }) {
                    if let Err(err) = self.refresh_at(now_ms) {
                        tracing::warn!(error = %err, "could not issue a new challenge");
                    }
                }
                state
            }
        };
        tracing::debug!(?attempt, state = state.name(), "challenge answer judged");
        SubmitOutcome { attempt, state }
    }

    pub fn skip(&mut self, gateway: &mut Gateway) -> RoutingState {
        gateway.challenge_skipped()
    }
}
