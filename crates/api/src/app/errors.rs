//! The single error boundary: domain errors to envelope responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use trekly_core::DomainError;

use crate::config::Environment;

/// Render a domain error as a client response.
///
/// Operational errors surface their own message; anything else is logged
/// server-side and collapses to a generic 500 (development responses carry
/// the detail under `error`).
pub fn domain_error_to_response(environment: Environment, err: DomainError) -> Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::Conflict(_) | DomainError::InvalidId(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if err.is_operational() {
        return json_fail(status, err.to_string());
    }

    tracing::error!(error = %err, "unexpected failure");
    match environment {
        Environment::Development => (
            status,
            Json(json!({
                "status": "error",
                "message": "Something went very wrong!",
                "error": err.to_string(),
            })),
        )
            .into_response(),
        Environment::Production => json_fail(status, "Something went very wrong!"),
    }
}

/// `{"status": "fail" | "error", "message": ...}` with the given status code.
pub fn json_fail(status: StatusCode, message: impl Into<String>) -> Response {
    let word = if status.is_server_error() {
        "error"
    } else {
        "fail"
    };
    (
        status,
        Json(json!({
            "status": word,
            "message": message.into(),
        })),
    )
        .into_response()
}
