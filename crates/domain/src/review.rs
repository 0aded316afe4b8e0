//! The Review entity and the rating aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use trekly_core::validate::Violations;
use trekly_core::{DomainResult, ReviewId, TourId, UserId};
use trekly_store::Document;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub review: String,
    pub rating: f64,
    pub tour: TourId,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

/// Creation payload. `tour` and `user` are filled from the route and the
/// authenticated user when absent (nested-route creation).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewReview {
    pub review: String,
    pub rating: Option<f64>,
    pub tour: Option<TourId>,
    pub user: Option<UserId>,
}

impl Review {
    pub fn create(new: NewReview, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require(new.rating.is_some(), "A review must have a rating");
        violations.require(new.tour.is_some(), "Review must belong to a tour");
        violations.require(new.user.is_some(), "Review must belong to a user");
        violations.into_result()?;

        let review = Self {
            id: ReviewId::new(),
            review: new.review.trim().to_string(),
            rating: new.rating.unwrap_or_default(),
            tour: new.tour.unwrap_or_default(),
            user: new.user.unwrap_or_default(),
            created_at: now,
        };
        review.validate()?;
        Ok(review)
    }

    /// Unique key for the one-review-per-user-per-tour constraint.
    pub fn pair_key(&self) -> String {
        format!("{}:{}", self.tour, self.user)
    }
}

impl Document for Review {
    const NAME: &'static str = "reviews";

    fn id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn validate(&self) -> DomainResult<()> {
        let mut violations = Violations::new();
        violations.require(!self.review.is_empty(), "Review cannot be empty");
        violations.require(
            (1.0..=5.0).contains(&self.rating),
            "Rating must be between 1.0 and 5.0",
        );
        violations.into_result()
    }

    /// Only the text and rating are writable; a review never moves to a
    /// different tour or author.
    fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self> {
        let mut updated = self.clone();
        if let Some(text) = patch.get("review") {
            updated.review = text
                .as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| trekly_core::DomainError::validation("review must be a string"))?;
        }
        if let Some(rating) = patch.get("rating") {
            updated.rating = rating
                .as_f64()
                .ok_or_else(|| trekly_core::DomainError::validation("rating must be a number"))?;
        }
        updated.validate()?;
        Ok(updated)
    }
}

/// The derived rating aggregate of a tour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingStats {
    pub average: f64,
    pub quantity: u32,
}

impl RatingStats {
    /// Recompute from the full review set of one tour.
    ///
    /// No reviews resets to the 4.5 / 0 defaults.
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                average: 4.5,
                quantity: 0,
            };
        }
        let sum: f64 = reviews.iter().map(|r| r.rating).sum();
        Self {
            average: sum / reviews.len() as f64,
            quantity: reviews.len() as u32,
        }
    }
}
