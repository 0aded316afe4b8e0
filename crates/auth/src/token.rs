//! Session token issue/verify (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trekly_core::{DomainError, UserId};

/// Claims carried by a session token.
///
/// `iat`/`exp` are unix-second timestamps as the JWT spec expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user.
    pub sub: UserId,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiration, unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token! Please login again")]
    Invalid,

    #[error("Your token has expired. Please login again")]
    Expired,
}

impl From<TokenError> for DomainError {
    fn from(err: TokenError) -> Self {
        DomainError::unauthorized(err.to_string())
    }
}

/// HS256 signer/verifier over a shared secret.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a fresh time-boxed token for a user.
    pub fn sign(&self, user: UserId, now: DateTime<Utc>) -> Result<String, DomainError> {
        let claims = Claims {
            sub: user,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::internal(format!("failed to sign token: {e}")))
    }

    /// Cryptographically verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> Hs256TokenCodec {
        Hs256TokenCodec::new(b"test-secret", Duration::minutes(10))
    }

    #[test]
    fn sign_then_verify_round_trips_claims() {
        let codec = codec();
        let user = UserId::new();
        let now = Utc::now();
        let token = codec.sign(user, now).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn tampered_token_is_invalid() {
        let codec = codec();
        let token = codec.sign(UserId::new(), Utc::now()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(codec.verify(&tampered).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = codec().sign(UserId::new(), Utc::now()).unwrap();
        let other = Hs256TokenCodec::new(b"other-secret", Duration::minutes(10));
        assert_eq!(other.verify(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let codec = codec();
        let token = codec.sign(UserId::new(), Utc::now() - Duration::hours(1)).unwrap();
        assert_eq!(codec.verify(&token).unwrap_err(), TokenError::Expired);
    }
}
