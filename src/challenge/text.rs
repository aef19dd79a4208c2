// src/challenge/text.rs
// Distorted-text challenge: a short alphanumeric code the visitor types back. Only the
// code is handed to the renderer; the expected answer lives in the signed token.

use std::time::Duration;

use rand::Rng;

use super::token::{ChallengeKey, ChallengePayload, TokenError};
use super::{ChallengeAttempt, ChallengeWidget, IssuedChallenge};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LENGTH: usize = 6;
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const NONCE_BYTES: usize = 12;

/// Uppercases and drops everything outside `A-Z0-9`, as the input box does.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn generate_code<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone)]
pub struct TextChallenge {
    key: ChallengeKey,
    ttl: Duration,
    length: usize,
}

impl Default for TextChallenge {
    fn default() -> Self {
        Self::new(ChallengeKey::from_env())
    }
}

impl TextChallenge {
    pub fn new(key: ChallengeKey) -> Self {
        Self {
            key,
            ttl: DEFAULT_TTL,
            length: CODE_LENGTH,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue_with_rng<R: Rng>(
        &self,
        rng: &mut R,
        now_ms: u64,
    ) -> Result<IssuedChallenge, TokenError> {
        let code = generate_code(rng, self.length);
        let nonce: String = (0..NONCE_BYTES)
            .map(|_| format!("{:02x}", rng.gen::<u8>()))
            .collect();
        let payload = ChallengePayload {
            answer_digest: self.key.answer_digest(&nonce, &code)?,
            nonce,
            issued_at: now_ms,
            expires_at: now_ms.saturating_add(self.ttl.as_millis() as u64),
        };
        Ok(IssuedChallenge {
            token: self.key.make_token(&payload)?,
            code,
            expires_at: payload.expires_at,
        })
    }
}

impl ChallengeWidget for TextChallenge {
    fn issue(&self, now_ms: u64) -> Result<IssuedChallenge, TokenError> {
        self.issue_with_rng(&mut rand::thread_rng(), now_ms)
    }

    fn verify(&self, token: &str, answer: &str, now_ms: u64) -> ChallengeAttempt {
        let payload = match self.key.parse_token(token) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting challenge token");
                return ChallengeAttempt::InvalidToken;
            }
        };
        if now_ms > payload.expires_at {
            return ChallengeAttempt::Expired;
        }
        if self.key.answer_matches(&payload, &normalize_answer(answer)) {
            ChallengeAttempt::Passed
        } else {
            ChallengeAttempt::Incorrect
        }
    }
}
