// src/challenge/token.rs
// Signed challenge tokens: `base64(payload_json).base64(hmac_sha256)`.

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SECRET_ENV: &str = "GATE_CHALLENGE_SECRET";

static PROCESS_SECRET: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut secret = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has no payload")]
    MissingPayload,
    #[error("token has no signature")]
    MissingSignature,
    #[error("token is not valid base64")]
    InvalidEncoding,
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token payload is malformed")]
    InvalidPayload,
    #[error("challenge key rejected by hmac")]
    InvalidKey,
}

/// What a challenge token vouches for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChallengePayload {
    pub nonce: String,
    /// Keyed digest of the normalized expected answer.
    pub answer_digest: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// HMAC key shared by token signing and answer digests.
#[derive(Clone)]
pub struct ChallengeKey {
    secret: Vec<u8>,
}

impl std::fmt::Debug for ChallengeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChallengeKey(..)")
    }
}

impl ChallengeKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// `GATE_CHALLENGE_SECRET` when set, else a random per-process secret.
    pub fn from_env() -> Self {
        match std::env::var(SECRET_ENV) {
            Ok(secret) if !secret.trim().is_empty() => Self::new(secret.into_bytes()),
            _ => Self::new(PROCESS_SECRET.clone()),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], sig: &[u8]) -> bool {
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(data);
        mac.verify_slice(sig).is_ok()
    }

    pub fn answer_digest(&self, nonce: &str, answer: &str) -> Result<String, TokenError> {
        let material = format!("{nonce}:{answer}");
        Ok(general_purpose::STANDARD.encode(self.sign(material.as_bytes())?))
    }

    pub fn answer_matches(&self, payload: &ChallengePayload, answer: &str) -> bool {
        let Ok(expected) = general_purpose::STANDARD.decode(payload.answer_digest.as_bytes()) else {
            return false;
        };
        let material = format!("{}:{answer}", payload.nonce);
        self.verify(material.as_bytes(), &expected)
    }

    pub fn make_token(&self, payload: &ChallengePayload) -> Result<String, TokenError> {
        let payload_json = serde_json::to_string(payload).map_err(|_| TokenError::InvalidPayload)?;
        let sig = self.sign(payload_json.as_bytes())?;
        let payload_b64 = general_purpose::STANDARD.encode(payload_json.as_bytes());
        let sig_b64 = general_purpose::STANDARD.encode(sig);
        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    pub fn parse_token(&self, token: &str) -> Result<ChallengePayload, TokenError> {
        let mut parts = token.splitn(2, '.');
        let payload_b64 = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or(TokenError::MissingPayload)?;
        let sig_b64 = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or(TokenError::MissingSignature)?;
        let payload_bytes = general_purpose::STANDARD
            .decode(payload_b64.as_bytes())
            .map_err(|_| TokenError::InvalidEncoding)?;
        let sig = general_purpose::STANDARD
            .decode(sig_b64.as_bytes())
            .map_err(|_| TokenError::InvalidEncoding)?;

        if !self.verify(&payload_bytes, &sig) {
            return Err(TokenError::SignatureMismatch);
        }

        serde_json::from_slice::<ChallengePayload>(&payload_bytes)
            .map_err(|_| TokenError::InvalidPayload)
    }
}
