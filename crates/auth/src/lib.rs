//! `trekly-auth`: authentication primitives, decoupled from HTTP and storage.
//!
//! Session tokens (HS256 JWT), password hashing, the password-reset token
//! lifecycle, and the role model live here. Extracting tokens from requests
//! and resolving users is the API layer's job.

pub mod password;
pub mod reset;
pub mod role;
pub mod token;

pub use password::{hash_password, verify_password};
pub use reset::{ResetToken, reset_digest};
pub use role::Role;
pub use token::{Claims, Hs256TokenCodec, TokenError};
