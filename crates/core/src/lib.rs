//! `trekly-core`: shared domain vocabulary (ids, errors, validation helpers).
//!
//! This crate is intentionally free of HTTP and storage concerns.

pub mod error;
pub mod id;
pub mod validate;

pub use error::{DomainError, DomainResult};
pub use id::{BookingId, ReviewId, TourId, UserId};
