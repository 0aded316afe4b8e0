//! `trekly-domain`: the entity models (Tour, User, Review, Booking).
//!
//! Each model owns its construction payload, an explicit `validate()`
//! (invoked by the store before every persist), and its partial-update
//! semantics via [`trekly_store::Document::apply_patch`]. There are no
//! hidden hooks: password hashing, slug generation, and aggregate rounding
//! all happen in named functions.

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::{Booking, NewBooking};
pub use review::{NewReview, RatingStats, Review};
pub use tour::{Difficulty, GeoPoint, NewTour, Tour};
pub use user::{NewUser, User};
