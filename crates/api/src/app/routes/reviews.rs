use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
};
use chrono::Utc;
use serde_json::{Map, Value};

use trekly_auth::Role;
use trekly_core::TourId;
use trekly_domain::{NewReview, Review};
use trekly_store::Predicate;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors, handlers};
use crate::context::CurrentUser;
use crate::middleware::AuthState;

/// Flat `/reviews` routes; everything requires a session.
pub fn router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route(
            "/:id",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth,
            crate::middleware::require_auth,
        ))
}

/// Nested under `/tours/:id/reviews`: list and create scoped to the tour.
pub fn nested_router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(list_tour_reviews).post(create_tour_review))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            crate::middleware::require_auth,
        ))
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    handlers::list_documents(&services.reviews, &[], &params, "reviews")
}

pub async fn list_tour_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tour_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let scope = vec![Predicate::eq("tour", Value::from(tour_id))];
    handlers::list_documents(&services.reviews, &scope, &params, "reviews")
}

pub async fn get_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    handlers::read_document(services.config.environment, &services.reviews, &id, "review")
}

pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    dto::AppJson(body): dto::AppJson<NewReview>,
) -> Response {
    create(&services, &current, body)
}

pub async fn create_tour_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
    dto::AppJson(mut body): dto::AppJson<NewReview>,
) -> Response {
    match handlers::parse_id(&tour_id) {
        Ok(id) => body.tour = Some(TourId::from_uuid(id)),
        Err(e) => return errors::domain_error_to_response(services.config.environment, e),
    }
    create(&services, &current, body)
}

fn create(services: &AppServices, current: &CurrentUser, mut body: NewReview) -> Response {
    let environment = services.config.environment;
    if let Err(resp) = common::authorize(services, current.user(), &[Role::User]) {
        return resp;
    }
    if body.user.is_none() {
        body.user = Some(current.id());
    }

    // The referenced tour must exist before we accept a review for it.
    if let Some(tour) = body.tour {
        if services.tours.get(*tour.as_uuid()).is_none() {
            return errors::domain_error_to_response(
                environment,
                trekly_core::DomainError::not_found("No document found with that ID"),
            );
        }
    }

    let review = match Review::create(body, Utc::now()).and_then(|r| services.reviews.insert(r)) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(environment, e),
    };
    if let Err(e) = services.recompute_tour_ratings(review.tour) {
        return errors::domain_error_to_response(environment, e);
    }

    dto::success_doc(environment, StatusCode::CREATED, "review", &review)
}

/// Only the author or an admin may touch an existing review.
fn load_owned(
    services: &AppServices,
    current: &CurrentUser,
    raw_id: &str,
) -> Result<Review, Response> {
    let environment = services.config.environment;
    let review = handlers::parse_id(raw_id)
        .and_then(|id| services.reviews.require(id))
        .map_err(|e| errors::domain_error_to_response(environment, e))?;
    if current.role() != Role::Admin && review.user != current.id() {
        return Err(errors::domain_error_to_response(
            environment,
            trekly_core::DomainError::forbidden(),
        ));
    }
    Ok(review)
}

pub async fn update_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    dto::AppJson(patch): dto::AppJson<Map<String, Value>>,
) -> Response {
    let environment = services.config.environment;
    let review = match load_owned(&services, &current, &id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let updated = match services.reviews.update(*review.id.as_uuid(), &patch) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(environment, e),
    };
    if let Err(e) = services.recompute_tour_ratings(updated.tour) {
        return errors::domain_error_to_response(environment, e);
    }

    dto::success_doc(environment, StatusCode::OK, "review", &updated)
}

pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let environment = services.config.environment;
    let review = match load_owned(&services, &current, &id) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if let Err(e) = services.reviews.remove(*review.id.as_uuid()) {
        return errors::domain_error_to_response(environment, e);
    }
    if let Err(e) = services.recompute_tour_ratings(review.tour) {
        return errors::domain_error_to_response(environment, e);
    }

    dto::no_content()
}
