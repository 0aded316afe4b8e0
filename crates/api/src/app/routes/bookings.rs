use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Host, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
};
use chrono::Utc;
use serde_json::{Map, Value};

use trekly_auth::Role;
use trekly_domain::{Booking, NewBooking};

use crate::app::collaborators::CheckoutRequest;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors, handlers};
use crate::context::CurrentUser;
use crate::middleware::AuthState;

/// Everything requires a session; the CRUD surface is admin/lead-guide only.
pub fn router(auth: AuthState) -> Router {
    Router::new()
        .route("/checkout-session/:id", get(checkout_session))
        .route("/my-tours", get(my_tours))
        .route("/", get(list_bookings).post(create_booking))
        .route(
            "/:id",
            get(get_booking).patch(update_booking).delete(delete_booking),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth,
            crate::middleware::require_auth,
        ))
}

/// Open a checkout session with the payment collaborator for one tour.
pub async fn checkout_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Host(host): Host,
    Path(id): Path<String>,
) -> Response {
    let environment = services.config.environment;
    let tour = match handlers::parse_id(&id).and_then(|id| services.tours.require(id)) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(environment, e),
    };

    let request = CheckoutRequest {
        reference: tour.id.to_string(),
        name: format!("{} Tour", tour.name),
        amount: tour.price,
        currency: "usd".to_string(),
        customer_email: current.user().email.clone(),
        success_url: format!("http://{host}/"),
        cancel_url: format!("http://{host}/tours/{}", tour.slug),
    };

    match services.payments.create_checkout_session(request) {
        Ok(session) => dto::success_doc(environment, StatusCode::OK, "session", &session),
        Err(e) => errors::domain_error_to_response(environment, e),
    }
}

/// The tours the current user has booked.
pub async fn my_tours(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let user_id = current.id();
    let tours: Vec<Value> = services
        .bookings
        .find(|b| b.user == user_id)
        .iter()
        .filter_map(|b| services.tours.get(*b.tour.as_uuid()))
        .filter_map(|t| serde_json::to_value(t).ok())
        .collect();
    dto::success_list("tours", tours)
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin, Role::LeadGuide])
    {
        return resp;
    }
    handlers::list_documents(&services.bookings, &[], &params, "bookings")
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    dto::AppJson(body): dto::AppJson<NewBooking>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin, Role::LeadGuide])
    {
        return resp;
    }
    handlers::create_document(
        services.config.environment,
        &services.bookings,
        Booking::create(body, Utc::now()),
        "booking",
    )
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin, Role::LeadGuide])
    {
        return resp;
    }
    handlers::read_document(
        services.config.environment,
        &services.bookings,
        &id,
        "booking",
    )
}

pub async fn update_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    dto::AppJson(patch): dto::AppJson<Map<String, Value>>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin, Role::LeadGuide])
    {
        return resp;
    }
    handlers::update_document(
        services.config.environment,
        &services.bookings,
        &id,
        &patch,
        "booking",
    )
}

pub async fn delete_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin, Role::LeadGuide])
    {
        return resp;
    }
    handlers::delete_document(services.config.environment, &services.bookings, &id)
}
