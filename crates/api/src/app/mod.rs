//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: collections, token codec, and collaborator wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `handlers.rs`: the generic CRUD handlers shared by the resources
//! - `dto.rs`: request DTOs and the success envelope
//! - `errors.rs`: consistent error responses
//! - `collaborators.rs`: mailer and payment-gateway contracts

use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, http::Uri, response::Response, routing::get};
use tower::ServiceBuilder;

use crate::config::Config;
use crate::middleware;

pub mod collaborators;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: Config) -> Router {
    build_app_with_services(Arc::new(services::build_services(config)))
}

/// Same router over pre-built services; tests use this to inject
/// recording collaborators.
pub fn build_app_with_services(services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        services: services.clone(),
    };
    let limiter = Arc::new(middleware::RateLimiter::new(
        services.config.rate_limit_max,
        services.config.rate_limit_window,
    ));

    let api = routes::router(auth_state).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(not_found)
}

async fn health() -> Response {
    dto::success(StatusCode::OK, serde_json::Value::Null)
}

async fn not_found(uri: Uri) -> Response {
    errors::json_fail(
        StatusCode::NOT_FOUND,
        format!("Can't find {} on this server!", uri.path()),
    )
}
