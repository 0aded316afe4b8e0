use axum::http::HeaderMap;
use axum::response::Response;

use trekly_auth::Role;
use trekly_core::DomainError;
use trekly_domain::User;

use crate::app::{errors, services::AppServices};
use crate::middleware;

/// Handler-level auth for routers that mix public and protected methods on
/// the same path. Runs the same verification chain as the middleware, then
/// the role gate.
pub fn require_role(
    services: &AppServices,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<User, Response> {
    let user = middleware::authenticate(services, headers)
        .map_err(|e| errors::domain_error_to_response(services.config.environment, e))?;
    authorize(services, &user, allowed)?;
    Ok(user)
}

/// Role gate for an already-authenticated user.
pub fn authorize(services: &AppServices, user: &User, allowed: &[Role]) -> Result<(), Response> {
    if user.role.is_any_of(allowed) {
        Ok(())
    } else {
        Err(errors::domain_error_to_response(
            services.config.environment,
            DomainError::forbidden(),
        ))
    }
}
