//! The Booking entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use trekly_core::validate::Violations;
use trekly_core::{BookingId, DomainResult, TourId, UserId};
use trekly_store::Document;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: BookingId,
    pub tour: TourId,
    pub user: UserId,
    pub price: f64,
    /// False only for bookings created out-of-band (e.g. pay on arrival).
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub tour: Option<TourId>,
    pub user: Option<UserId>,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

fn default_paid() -> bool {
    true
}

impl Booking {
    pub fn create(new: NewBooking, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require(new.tour.is_some(), "Booking must belong to a tour");
        violations.require(new.user.is_some(), "Booking must belong to a user");
        violations.into_result()?;

        let booking = Self {
            id: BookingId::new(),
            tour: new.tour.unwrap_or_default(),
            user: new.user.unwrap_or_default(),
            price: new.price,
            paid: new.paid,
            created_at: now,
        };
        booking.validate()?;
        Ok(booking)
    }
}

impl Document for Booking {
    const NAME: &'static str = "bookings";

    fn id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn validate(&self) -> DomainResult<()> {
        let mut violations = Violations::new();
        violations.require(self.price > 0.0, "Booking must have a price");
        violations.into_result()
    }

    fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self> {
        let mut updated = self.clone();
        if let Some(price) = patch.get("price") {
            updated.price = price
                .as_f64()
                .ok_or_else(|| trekly_core::DomainError::validation("price must be a number"))?;
        }
        if let Some(paid) = patch.get("paid") {
            updated.paid = paid
                .as_bool()
                .ok_or_else(|| trekly_core::DomainError::validation("paid must be a boolean"))?;
        }
        updated.validate()?;
        Ok(updated)
    }
}
