//! Password-reset token lifecycle.
//!
//! The user receives the plaintext token (by email); only its sha-256 digest
//! is stored, with a 10-minute expiry. The token is single-use: redeeming it
//! clears the stored digest.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// How long a reset token stays redeemable.
pub fn reset_token_ttl() -> Duration {
    Duration::minutes(10)
}

/// A freshly issued reset token.
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Handed to the user (via the mailer); never stored.
    pub plaintext: String,
    /// Stored on the user record for later lookup.
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Generate a random 32-byte token and its stored digest.
    pub fn issue(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);
        Self {
            digest: reset_digest(&plaintext),
            plaintext,
            expires_at: now + reset_token_ttl(),
        }
    }
}

/// One-way digest of a plaintext reset token.
pub fn reset_digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
