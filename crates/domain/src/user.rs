//! The User entity.
//!
//! The password hash, reset-token digest, and reset expiry are
//! `skip_serializing`: they can never appear in a response body or a queried
//! document, which also means the generic value-level query path cannot leak
//! them. All mutations of those fields go through named methods here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use trekly_auth::reset::ResetToken;
use trekly_auth::{Role, hash_password, reset_digest, verify_password};
use trekly_core::validate::{Violations, is_email};
use trekly_core::{DomainError, DomainResult, UserId};
use trekly_store::Document;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Stored lowercased; uniqueness is enforced by the collection index.
    pub email: String,
    pub photo: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_digest: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    /// Soft-delete flag; inactive users are excluded from default queries.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Signup payload. The role is deliberately absent: everyone signs up as a
/// plain user, and only an admin can promote afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl User {
    pub fn register(new: NewUser, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require(!new.name.trim().is_empty(), "Please tell us your name");
        check_password_pair(&mut violations, &new.password, &new.password_confirm);
        let email = new.email.trim().to_lowercase();
        violations.require(is_email(&email), "Please provide a valid email");
        violations.into_result()?;

        let user = Self {
            id: UserId::new(),
            name: new.name.trim().to_string(),
            email,
            photo: None,
            role: Role::User,
            password_hash: hash_password(&new.password)?,
            password_changed_at: None,
            password_reset_digest: None,
            password_reset_expires: None,
            active: true,
            created_at: now,
        };
        Ok(user)
    }

    /// Hash comparison against the stored password.
    pub fn password_matches(&self, candidate: &str) -> bool {
        verify_password(candidate, &self.password_hash)
    }

    /// Stale-token check: was the password changed after the token was issued?
    ///
    /// `issued_at` has second precision, so the change stamp is backdated one
    /// second on write to keep a token issued in the same instant valid.
    pub fn changed_password_after(&self, issued_at: DateTime<Utc>) -> bool {
        match self.password_changed_at {
            Some(changed_at) => issued_at < changed_at,
            None => false,
        }
    }

    /// Set a new password, re-running the pair validation and stamping
    /// `password_changed_at`.
    pub fn set_password(
        &mut self,
        password: &str,
        password_confirm: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut violations = Violations::new();
        check_password_pair(&mut violations, password, password_confirm);
        violations.into_result()?;
        self.password_hash = hash_password(password)?;
        self.password_changed_at = Some(now - Duration::seconds(1));
        Ok(())
    }

    /// Store the digest/expiry of a freshly issued reset token.
    pub fn start_password_reset(&mut self, token: &ResetToken) {
        self.password_reset_digest = Some(token.digest.clone());
        self.password_reset_expires = Some(token.expires_at);
    }

    /// Roll back or consume the stored reset token.
    pub fn clear_password_reset(&mut self) {
        self.password_reset_digest = None;
        self.password_reset_expires = None;
    }

    /// Whether a supplied plaintext token redeems against this user now.
    pub fn reset_token_matches(&self, plaintext: &str, now: DateTime<Utc>) -> bool {
        let (Some(digest), Some(expires)) =
            (&self.password_reset_digest, self.password_reset_expires)
        else {
            return false;
        };
        expires > now && *digest == reset_digest(plaintext)
    }

    /// Soft delete: the record stays, default queries stop seeing it.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

fn check_password_pair(violations: &mut Violations, password: &str, confirm: &str) {
    violations.require(!password.is_empty(), "Please provide a password");
    violations.require(
        password.is_empty() || password.chars().count() >= 8,
        "A password must have at least 8 characters",
    );
    violations.require(!confirm.is_empty(), "Please confirm your password");
    violations.require(
        confirm.is_empty() || password == confirm,
        "Passwords are not the same!",
    );
}

impl Document for User {
    const NAME: &'static str = "users";

    fn id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn validate(&self) -> DomainResult<()> {
        let mut violations = Violations::new();
        violations.require(!self.name.is_empty(), "Please tell us your name");
        violations.require(is_email(&self.email), "Please provide a valid email");
        violations.require(!self.password_hash.is_empty(), "Please provide a password");
        violations.into_result()
    }

    /// Partial update for the admin CRUD path. Only profile fields are
    /// writable; password changes must go through the dedicated flows so the
    /// hashing and freshness stamping always run.
    fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self> {
        if patch.contains_key("password") || patch.contains_key("password_confirm") {
            return Err(DomainError::validation(
                "This route is not for password updates. Please use /update-my-password",
            ));
        }
        let mut updated = self.clone();
        for (key, value) in patch {
            match key.as_str() {
                "name" => {
                    updated.name = as_string(value, "name")?;
                }
                "email" => {
                    updated.email = as_string(value, "email")?.trim().to_lowercase();
                }
                "photo" => {
                    updated.photo = match value {
                        Value::Null => None,
                        other => Some(as_string(other, "photo")?),
                    };
                }
                "role" => {
                    updated.role = serde_json::from_value(value.clone())
                        .map_err(|_| DomainError::validation("Invalid role"))?;
                }
                "active" => {
                    updated.active = value
                        .as_bool()
                        .ok_or_else(|| DomainError::validation("active must be a boolean"))?;
                }
                // Anything else (including unknown keys) is ignored, matching
                // the permissive patch semantics of the other entities.
                _ => {}
            }
        }
        updated.validate()?;
        Ok(updated)
    }
}

fn as_string(value: &Value, field: &str) -> DomainResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DomainError::validation(format!("{field} must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> NewUser {
        NewUser {
            name: "Jonas".to_string(),
            email: "Jonas@Example.COM".to_string(),
            password: "pass1234".to_string(),
            password_confirm: "pass1234".to_string(),
        }
    }

    #[test]
    fn register_hashes_and_lowercases() {
        let user = User::register(signup(), Utc::now()).unwrap();
        assert_eq!(user.email, "jonas@example.com");
        assert_ne!(user.password_hash, "pass1234");
        assert_eq!(user.role, Role::User);
        assert!(user.active);
        assert!(user.password_matches("pass1234"));
        assert!(!user.password_matches("wrong999"));
    }

    #[test]
    fn password_never_serializes() {
        let user = User::register(signup(), Utc::now()).unwrap();
        let value = serde_json::to_value(&user).unwrap();
        let text = value.to_string();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("password_reset_digest").is_none());
        assert!(!text.contains("pass1234"));
        assert!(!text.contains("argon2"));
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let mut new = signup();
        new.password_confirm = "different1".to_string();
        let err = User::register(new, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Passwords are not the same!"));
    }

    #[test]
    fn short_password_is_rejected() {
        let mut new = signup();
        new.password = "short".to_string();
        new.password_confirm = "short".to_string();
        assert!(User::register(new, Utc::now()).is_err());
    }

    #[test]
    fn stale_token_detection() {
        let mut user = User::register(signup(), Utc::now()).unwrap();
        let issued_at = Utc::now();
        assert!(!user.changed_password_after(issued_at));
        user.set_password("newpass99", "newpass99", issued_at + Duration::minutes(5))
            .unwrap();
        assert!(user.changed_password_after(issued_at));
        // A token issued after the change stays fresh.
        assert!(!user.changed_password_after(issued_at + Duration::minutes(6)));
    }

    #[test]
    fn reset_token_lifecycle() {
        let now = Utc::now();
        let mut user = User::register(signup(), now).unwrap();
        let token = ResetToken::issue(now);
        user.start_password_reset(&token);

        assert!(user.reset_token_matches(&token.plaintext, now));
        assert!(!user.reset_token_matches("wrong-token", now));
        // Past expiry the same token no longer redeems.
        assert!(!user.reset_token_matches(&token.plaintext, now + Duration::minutes(11)));

        user.clear_password_reset();
        assert!(!user.reset_token_matches(&token.plaintext, now));
    }

    #[test]
    fn patch_rejects_password_fields() {
        let user = User::register(signup(), Utc::now()).unwrap();
        let mut patch = Map::new();
        patch.insert("password".into(), Value::from("sneaky-pass"));
        let err = user.apply_patch(&patch).unwrap_err();
        assert!(err.to_string().contains("not for password updates"));
    }

    #[test]
    fn patch_updates_profile_fields_only() {
        let user = User::register(signup(), Utc::now()).unwrap();
        let mut patch = Map::new();
        patch.insert("name".into(), Value::from("New Name"));
        patch.insert("role".into(), Value::from("lead-guide"));
        let updated = user.apply_patch(&patch).unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.role, Role::LeadGuide);
        // The hash survives a patch untouched.
        assert_eq!(updated.password_hash, user.password_hash);
    }
}
