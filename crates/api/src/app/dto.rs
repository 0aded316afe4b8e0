//! Request DTOs, the JSON body extractor, and the success envelope.

use axum::Json;
use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use trekly_core::DomainError;

use crate::app::errors;
use crate::config::Environment;

/// `axum::Json` with rejections rendered through the standard envelope.
///
/// A malformed or wrong-typed body is a validation failure like any other,
/// so it gets the 400 `{"status":"fail"}` shape instead of axum's
/// plain-text 422.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let err = DomainError::validation(rejection.body_text());
                Err(errors::json_fail(StatusCode::BAD_REQUEST, err.to_string()))
            }
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

// -------------------------
// Success envelope
// -------------------------

/// `{"status": "success", "data": ...}`.
pub fn success(status: StatusCode, data: Value) -> Response {
    let mut body = Map::new();
    body.insert("status".into(), Value::from("success"));
    body.insert("data".into(), data);
    (status, Json(Value::Object(body))).into_response()
}

/// One document under its resource key.
pub fn success_doc<T: Serialize>(
    environment: Environment,
    status: StatusCode,
    key: &str,
    value: &T,
) -> Response {
    match serde_json::to_value(value) {
        Ok(doc) => {
            let mut data = Map::new();
            data.insert(key.to_string(), doc);
            success(status, Value::Object(data))
        }
        Err(e) => errors::domain_error_to_response(environment, DomainError::internal(e.to_string())),
    }
}

/// A list under its resource key, with the `results` count.
pub fn success_list(key: &str, items: Vec<Value>) -> Response {
    let mut data = Map::new();
    let results = items.len();
    data.insert(key.to_string(), Value::Array(items));

    let mut body = Map::new();
    body.insert("status".into(), Value::from("success"));
    body.insert("results".into(), Value::from(results));
    body.insert("data".into(), Value::Object(data));
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
