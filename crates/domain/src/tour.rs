//! The Tour entity.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use trekly_core::validate::Violations;
use trekly_core::{DomainResult, TourId, UserId};
use trekly_store::Document;

/// Mean earth radius, used by the haversine distance below.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

/// A geographic point with optional itinerary metadata.
///
/// Coordinates are `[longitude, latitude]`, GeoJSON order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub day: Option<u32>,
}

impl GeoPoint {
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, lat: f64, lng: f64) -> f64 {
        let (lat1, lng1) = (self.lat().to_radians(), self.lng().to_radians());
        let (lat2, lng2) = (lat.to_radians(), lng.to_radians());
        let dlat = lat2 - lat1;
        let dlng = lng2 - lng1;
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tour {
    pub id: TourId,
    pub name: String,
    /// Derived from `name` on every write.
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    /// Aggregate over this tour's reviews; 4.5 when there are none.
    pub ratings_average: f64,
    pub ratings_quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    /// Secret tours are excluded from default listings.
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    /// Weak references to guide users; resolved lazily by callers.
    #[serde(default)]
    pub guides: Vec<UserId>,
    /// Derived: duration in weeks; recomputed on every write, never input.
    pub duration_weeks: f64,
    pub created_at: DateTime<Utc>,
}

/// Creation payload. Everything defaults so validation can report all
/// missing fields at once instead of failing at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTour {
    pub name: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Option<Difficulty>,
    pub ratings_average: Option<f64>,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<GeoPoint>,
    pub guides: Vec<UserId>,
}

impl Tour {
    pub fn create(new: NewTour, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require(new.difficulty.is_some(), "A tour must have a difficulty");

        let mut tour = Self {
            id: TourId::new(),
            slug: String::new(),
            name: new.name,
            duration: new.duration,
            max_group_size: new.max_group_size,
            difficulty: new.difficulty.unwrap_or(Difficulty::Medium),
            ratings_average: new.ratings_average.unwrap_or(4.5),
            ratings_quantity: 0,
            price: new.price,
            price_discount: new.price_discount,
            summary: new.summary,
            description: new.description,
            image_cover: new.image_cover,
            images: new.images,
            start_dates: new.start_dates,
            secret: new.secret,
            start_location: new.start_location,
            locations: new.locations,
            guides: new.guides,
            duration_weeks: 0.0,
            created_at: now,
        };
        tour.normalize();
        tour.check(violations)?;
        Ok(tour)
    }

    /// Recompute every derived field. Runs on create and on every update.
    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.slug = slugify(&self.name);
        self.duration_weeks = f64::from(self.duration) / 7.0;
        self.ratings_average = round_rating(self.ratings_average);
    }

    /// Apply a recomputed review aggregate.
    pub fn set_rating_stats(&mut self, average: f64, quantity: u32) {
        self.ratings_average = round_rating(average);
        self.ratings_quantity = quantity;
    }

    fn check(&self, mut violations: Violations) -> DomainResult<()> {
        violations.require(!self.name.is_empty(), "A tour must have a name");
        if !self.name.is_empty() {
            violations.require(
                self.name.chars().count() >= 10,
                "A tour name must have more than or equal to 10 characters",
            );
            violations.require(
                self.name.chars().count() <= 40,
                "A tour name must have less than or equal to 40 characters",
            );
        }
        violations.require(self.duration >= 1, "A tour must have a duration");
        violations.require(self.max_group_size >= 1, "A tour must have a group size");
        violations.require(self.price > 0.0, "A tour must have a price");
        if let Some(discount) = self.price_discount {
            violations.require(
                discount < self.price,
                "Discount price should be below the regular price",
            );
        }
        violations.require(!self.summary.is_empty(), "A tour must have a summary");
        violations.require(
            (1.0..=5.0).contains(&self.ratings_average),
            "Rating must be between 1.0 and 5.0",
        );
        violations.into_result()
    }

    /// How many of this tour's departures fall in the given month. A tour
    /// with several start dates in one month counts once per date.
    pub fn starts_in_month(&self, year: i32, month: u32) -> usize {
        self.start_dates
            .iter()
            .filter(|d| d.year() == year && d.month() == month)
            .count()
    }
}

impl Document for Tour {
    const NAME: &'static str = "tours";

    fn id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn validate(&self) -> DomainResult<()> {
        self.check(Violations::new())
    }

    fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self> {
        let mut merged = serde_json::to_value(self)
            .map_err(|e| trekly_core::DomainError::internal(e.to_string()))?;
        let obj = merged
            .as_object_mut()
            .ok_or_else(|| trekly_core::DomainError::internal("tour did not serialize to an object"))?;
        for (key, value) in patch {
            // Identity and derived fields are never writable.
            if matches!(key.as_str(), "id" | "created_at" | "slug" | "duration_weeks") {
                continue;
            }
            obj.insert(key.clone(), value.clone());
        }
        let mut updated: Tour = serde_json::from_value(merged)
            .map_err(|e| trekly_core::DomainError::validation(e.to_string()))?;
        updated.normalize();
        updated.validate()?;
        Ok(updated)
    }
}

/// Round to one decimal, then clamp into the valid rating band.
fn round_rating(value: f64) -> f64 {
    ((value * 10.0).round() / 10.0).clamp(1.0, 5.0)
}

/// Lowercase, alphanumerics kept, everything else collapsed to single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tour() -> NewTour {
        NewTour {
            name: "The Forest Hiker".to_string(),
            duration: 5,
            max_group_size: 25,
            difficulty: Some(Difficulty::Easy),
            price: 397.0,
            summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
            ..NewTour::default()
        }
    }

    #[test]
    fn create_fills_defaults_and_derived_fields() {
        let tour = Tour::create(new_tour(), Utc::now()).unwrap();
        assert_eq!(tour.ratings_average, 4.5);
        assert_eq!(tour.ratings_quantity, 0);
        assert_eq!(tour.slug, "the-forest-hiker");
        assert!((tour.duration_weeks - 5.0 / 7.0).abs() < 1e-9);
        assert!(!tour.secret);
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let err = Tour::create(NewTour::default(), Utc::now()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("A tour must have a difficulty"));
        assert!(msg.contains("A tour must have a name"));
        assert!(msg.contains("A tour must have a duration"));
        assert!(msg.contains("A tour must have a price"));
    }

    #[test]
    fn name_length_bounds() {
        let mut short = new_tour();
        short.name = "Short".to_string();
        assert!(Tour::create(short, Utc::now()).is_err());

        let mut long = new_tour();
        long.name = "x".repeat(41);
        assert!(Tour::create(long, Utc::now()).is_err());
    }

    #[test]
    fn discount_must_be_below_price() {
        let mut t = new_tour();
        t.price_discount = Some(500.0);
        let err = Tour::create(t, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Discount price"));
    }

    #[test]
    fn rating_is_rounded_to_one_decimal_and_clamped() {
        let mut tour = Tour::create(new_tour(), Utc::now()).unwrap();
        tour.set_rating_stats(4.666_666, 3);
        assert_eq!(tour.ratings_average, 4.7);
        tour.set_rating_stats(9.0, 1);
        assert_eq!(tour.ratings_average, 5.0);
    }

    #[test]
    fn patch_cannot_touch_identity_or_derived_fields() {
        let tour = Tour::create(new_tour(), Utc::now()).unwrap();
        let mut patch = Map::new();
        patch.insert("id".into(), Value::String(Uuid::now_v7().to_string()));
        patch.insert("name".into(), Value::String("An Updated Tour Name".into()));
        let updated = tour.apply_patch(&patch).unwrap();
        assert_eq!(updated.id, tour.id);
        assert_eq!(updated.slug, "an-updated-tour-name");
    }

    #[test]
    fn patch_revalidates() {
        let tour = Tour::create(new_tour(), Utc::now()).unwrap();
        let mut patch = Map::new();
        patch.insert("price".into(), Value::from(0));
        assert!(tour.apply_patch(&patch).is_err());
    }

    #[test]
    fn haversine_distance_is_plausible() {
        // Los Angeles -> San Francisco is roughly 560 km.
        let la = GeoPoint {
            coordinates: [-118.24, 34.05],
            address: None,
            description: None,
            day: None,
        };
        let d = la.distance_km(37.77, -122.42);
        assert!((500.0..650.0).contains(&d), "got {d}");
    }

    #[test]
    fn monthly_bucketing_counts_each_departure() {
        let mut t = new_tour();
        t.start_dates = vec![
            "2024-06-05T09:00:00Z".parse().unwrap(),
            "2024-06-19T09:00:00Z".parse().unwrap(),
            "2024-07-01T09:00:00Z".parse().unwrap(),
        ];
        let tour = Tour::create(t, Utc::now()).unwrap();
        assert_eq!(tour.starts_in_month(2024, 6), 2);
        assert_eq!(tour.starts_in_month(2024, 7), 1);
        assert_eq!(tour.starts_in_month(2024, 8), 0);
        assert_eq!(tour.starts_in_month(2023, 6), 0);
    }
}
