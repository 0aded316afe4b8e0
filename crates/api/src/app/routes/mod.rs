use axum::Router;

use crate::middleware::AuthState;

pub mod bookings;
pub mod common;
pub mod reviews;
pub mod tours;
pub mod users;

/// Router for all `/api/v1` resources.
pub fn router(auth: AuthState) -> Router {
    Router::new()
        .nest("/tours", tours::router(auth.clone()))
        .nest("/users", users::router(auth.clone()))
        .nest("/reviews", reviews::router(auth.clone()))
        .nest("/bookings", bookings::router(auth))
}
