//! Password hashing (argon2id).
//!
//! Plaintext passwords exist only transiently at the request boundary; the
//! stored value is always a salted argon2 hash string.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};

use trekly_core::{DomainError, DomainResult};

/// Hash a plaintext password for storage.
pub fn hash_password(plain: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::internal(format!("password hashing failed: {e}")))
}

/// Constant-style comparison of a candidate password against a stored hash.
///
/// An unparsable stored hash verifies as false rather than erroring; the
/// caller treats it the same as a wrong password.
pub fn verify_password(candidate: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
