use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use trekly_auth::Role;
use trekly_core::DomainError;
use trekly_domain::{Difficulty, NewTour, Tour};
use trekly_store::Predicate;

use crate::app::routes::{common, reviews};
use crate::app::services::AppServices;
use crate::app::{dto, errors, handlers};
use crate::middleware::AuthState;

const MILES_TO_KM: f64 = 1.609_344;
const KM_TO_MILES: f64 = 0.621_371;

/// Reads are public; create/update/delete and the monthly plan are
/// role-gated in the handlers (the paths mix public and protected methods).
pub fn router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(list_tours).post(create_tour))
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/stats", get(tour_stats))
        .route("/monthly-plan/:year", get(monthly_plan))
        .route(
            "/within/:distance/center/:latlng/unit/:unit",
            get(tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(tour_distances))
        .route(
            "/:id",
            get(get_tour).patch(update_tour).delete(delete_tour),
        )
        .nest("/:id/reviews", reviews::nested_router(auth))
}

/// Secret tours never show up in listings.
fn default_scope() -> Vec<Predicate> {
    vec![Predicate::eq("secret", Value::Bool(false))]
}

pub async fn list_tours(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    handlers::list_documents(&services.tours, &default_scope(), &params, "tours")
}

/// Alias preset: the five best-rated tours, cheapest first on ties.
pub async fn top_five_cheap(
    Extension(services): Extension<Arc<AppServices>>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Response {
    params.insert("limit".to_string(), "5".to_string());
    params.insert("sort".to_string(), "-ratings_average,price".to_string());
    params.insert(
        "fields".to_string(),
        "name,price,ratings_average,summary,difficulty".to_string(),
    );
    handlers::list_documents(&services.tours, &default_scope(), &params, "tours")
}

pub async fn get_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let environment = services.config.environment;
    let tour = match handlers::parse_id(&id).and_then(|id| services.tours.require(id)) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(environment, e),
    };

    let mut doc = match serde_json::to_value(&tour) {
        Ok(v) => v,
        Err(e) => {
            return errors::domain_error_to_response(
                environment,
                DomainError::internal(e.to_string()),
            );
        }
    };

    // Eagerly resolve guide references and attach the tour's reviews.
    let guides: Vec<Value> = tour
        .guides
        .iter()
        .filter_map(|g| services.users.get(*g.as_uuid()))
        .filter_map(|u| serde_json::to_value(u).ok())
        .collect();
    let tour_reviews: Vec<Value> = services
        .reviews
        .find(|r| r.tour == tour.id)
        .iter()
        .filter_map(|r| serde_json::to_value(r).ok())
        .collect();
    doc["guides"] = Value::Array(guides);
    doc["reviews"] = Value::Array(tour_reviews);

    let mut data = Map::new();
    data.insert("tour".to_string(), doc);
    dto::success(StatusCode::OK, Value::Object(data))
}

pub async fn create_tour(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    dto::AppJson(body): dto::AppJson<NewTour>,
) -> Response {
    if let Err(resp) = common::require_role(&services, &headers, &[Role::Admin, Role::LeadGuide]) {
        return resp;
    }
    handlers::create_document(
        services.config.environment,
        &services.tours,
        Tour::create(body, Utc::now()),
        "tour",
    )
}

pub async fn update_tour(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    dto::AppJson(patch): dto::AppJson<Map<String, Value>>,
) -> Response {
    if let Err(resp) = common::require_role(&services, &headers, &[Role::Admin, Role::LeadGuide]) {
        return resp;
    }
    handlers::update_document(
        services.config.environment,
        &services.tours,
        &id,
        &patch,
        "tour",
    )
}

pub async fn delete_tour(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require_role(&services, &headers, &[Role::Admin, Role::LeadGuide]) {
        return resp;
    }
    handlers::delete_document(services.config.environment, &services.tours, &id)
}

#[derive(Debug, Serialize)]
struct DifficultyStats {
    difficulty: String,
    num_tours: usize,
    num_ratings: u64,
    avg_rating: f64,
    avg_price: f64,
    min_price: f64,
    max_price: f64,
}

/// Aggregate per difficulty over well-rated tours (average >= 4.5).
pub async fn tour_stats(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let mut stats = Vec::new();
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Difficult] {
        let group = services
            .tours
            .find(|t| !t.secret && t.difficulty == difficulty && t.ratings_average >= 4.5);
        if group.is_empty() {
            continue;
        }
        let n = group.len() as f64;
        stats.push(DifficultyStats {
            difficulty: format!("{difficulty:?}").to_uppercase(),
            num_tours: group.len(),
            num_ratings: group.iter().map(|t| u64::from(t.ratings_quantity)).sum(),
            avg_rating: group.iter().map(|t| t.ratings_average).sum::<f64>() / n,
            avg_price: group.iter().map(|t| t.price).sum::<f64>() / n,
            min_price: group.iter().map(|t| t.price).fold(f64::INFINITY, f64::min),
            max_price: group.iter().map(|t| t.price).fold(0.0, f64::max),
        });
    }
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));

    dto::success_doc(
        services.config.environment,
        StatusCode::OK,
        "stats",
        &stats,
    )
}

#[derive(Debug, Serialize)]
struct MonthlyPlanEntry {
    month: u32,
    num_tour_starts: usize,
    tours: Vec<String>,
}

/// Tour starts per month of a year, busiest month first.
pub async fn monthly_plan(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(year): Path<i32>,
) -> Response {
    if let Err(resp) = common::require_role(
        &services,
        &headers,
        &[Role::Admin, Role::LeadGuide, Role::Guide],
    ) {
        return resp;
    }

    let tours = services.tours.find(|t| !t.secret);
    let mut plan: Vec<MonthlyPlanEntry> = (1..=12)
        .filter_map(|month| {
            // One entry per departure, so a tour appears once per start date.
            let starting: Vec<String> = tours
                .iter()
                .flat_map(|t| {
                    std::iter::repeat_n(t.name.clone(), t.starts_in_month(year, month))
                })
                .collect();
            if starting.is_empty() {
                None
            } else {
                Some(MonthlyPlanEntry {
                    month,
                    num_tour_starts: starting.len(),
                    tours: starting,
                })
            }
        })
        .collect();
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));

    dto::success_doc(services.config.environment, StatusCode::OK, "plan", &plan)
}

/// Tours whose start location lies within `distance` of a center point.
pub async fn tours_within(
    Extension(services): Extension<Arc<AppServices>>,
    Path((distance, latlng, unit)): Path<(f64, String, String)>,
) -> Response {
    let Some((lat, lng)) = parse_latlng(&latlng) else {
        return errors::json_fail(
            StatusCode::BAD_REQUEST,
            "Please provide latitude and longitude in the format lat,lng",
        );
    };
    let radius_km = match unit.as_str() {
        "km" => distance,
        "mi" => distance * MILES_TO_KM,
        _ => return errors::json_fail(StatusCode::BAD_REQUEST, "Unit must be either mi or km"),
    };

    let matches: Vec<Value> = services
        .tours
        .find(|t| {
            !t.secret
                && t.start_location
                    .as_ref()
                    .is_some_and(|loc| loc.distance_km(lat, lng) <= radius_km)
        })
        .iter()
        .filter_map(|t| serde_json::to_value(t).ok())
        .collect();

    dto::success_list("tours", matches)
}

#[derive(Debug, Serialize)]
struct TourDistance {
    id: String,
    name: String,
    distance: f64,
}

/// Distance from a point to every tour's start location.
pub async fn tour_distances(
    Extension(services): Extension<Arc<AppServices>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Response {
    let Some((lat, lng)) = parse_latlng(&latlng) else {
        return errors::json_fail(
            StatusCode::BAD_REQUEST,
            "Please provide latitude and longitude in the format lat,lng",
        );
    };
    let multiplier = match unit.as_str() {
        "km" => 1.0,
        "mi" => KM_TO_MILES,
        _ => return errors::json_fail(StatusCode::BAD_REQUEST, "Unit must be either mi or km"),
    };

    let mut distances: Vec<TourDistance> = services
        .tours
        .find(|t| !t.secret && t.start_location.is_some())
        .iter()
        .filter_map(|t| {
            let loc = t.start_location.as_ref()?;
            Some(TourDistance {
                id: t.id.to_string(),
                name: t.name.clone(),
                distance: loc.distance_km(lat, lng) * multiplier,
            })
        })
        .collect();
    distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    dto::success_doc(
        services.config.environment,
        StatusCode::OK,
        "distances",
        &distances,
    )
}

fn parse_latlng(raw: &str) -> Option<(f64, f64)> {
    let (lat, lng) = raw.split_once(',')?;
    Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
}
