use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Host, Path, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use trekly_auth::{Role, reset_digest};
use trekly_core::DomainError;
use trekly_domain::{NewUser, User};
use trekly_store::Predicate;

use crate::app::collaborators::Email;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors, handlers};
use crate::config::Config;
use crate::context::CurrentUser;
use crate::middleware::AuthState;

pub fn router(auth: AuthState) -> Router {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", patch(reset_password));

    let protected = Router::new()
        .route("/update-my-password", patch(update_my_password))
        .route("/me", get(me))
        .route("/update-me", patch(update_me))
        .route("/delete-me", delete(delete_me))
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            crate::middleware::require_auth,
        ));

    public.merge(protected)
}

// -------------------------
// Session issuance
// -------------------------

fn session_cookie(token: &str, config: &Config) -> String {
    let mut cookie = format!(
        "jwt={token}; Path=/; HttpOnly; Max-Age={}",
        config.jwt_ttl.num_seconds()
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Issue a JWT for the user: token in the body, http-only cookie alongside.
fn send_session(
    services: &AppServices,
    user: &User,
    status: StatusCode,
    now: DateTime<Utc>,
) -> Response {
    let environment = services.config.environment;
    let token = match services.tokens.sign(user.id, now) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(environment, e),
    };
    let user_doc = match serde_json::to_value(user) {
        Ok(v) => v,
        Err(e) => {
            return errors::domain_error_to_response(
                environment,
                DomainError::internal(e.to_string()),
            );
        }
    };

    let mut data = Map::new();
    data.insert("user".to_string(), user_doc);
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from("success"));
    body.insert("token".to_string(), Value::from(token.clone()));
    body.insert("data".to_string(), Value::Object(data));

    (
        status,
        [(header::SET_COOKIE, session_cookie(&token, &services.config))],
        Json(Value::Object(body)),
    )
        .into_response()
}

// -------------------------
// Public auth endpoints
// -------------------------

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    dto::AppJson(body): dto::AppJson<NewUser>,
) -> Response {
    let now = Utc::now();
    let user = match User::register(body, now).and_then(|u| services.users.insert(u)) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(services.config.environment, e),
    };

    // Welcome mail failures are logged, never fatal.
    let welcome = Email {
        to: user.email.clone(),
        subject: "Welcome to the Trekly family!".to_string(),
        body: format!("Hi {}, welcome aboard!", user.name),
    };
    if let Err(e) = services.mailer.send(welcome) {
        tracing::warn!(error = %e, "welcome email failed");
    }

    send_session(&services, &user, StatusCode::CREATED, now)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    dto::AppJson(body): dto::AppJson<dto::LoginRequest>,
) -> Response {
    if body.email.is_empty() || body.password.is_empty() {
        return errors::json_fail(StatusCode::BAD_REQUEST, "Please provide email and password!");
    }

    // Unknown email and wrong password are indistinguishable on purpose.
    let user = services
        .find_active_user_by_email(&body.email)
        .filter(|u| u.password_matches(&body.password));
    match user {
        Some(user) => send_session(&services, &user, StatusCode::OK, Utc::now()),
        None => errors::json_fail(StatusCode::UNAUTHORIZED, "Incorrect email or password"),
    }
}

/// Overwrite the session cookie with a short-lived dummy value.
pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            "jwt=logged-out; Path=/; HttpOnly; Max-Age=10".to_string(),
        )],
        Json(serde_json::json!({ "status": "success" })),
    )
        .into_response()
}

pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    Host(host): Host,
    dto::AppJson(body): dto::AppJson<dto::ForgotPasswordRequest>,
) -> Response {
    let environment = services.config.environment;
    let Some(mut user) = services.find_active_user_by_email(&body.email) else {
        return errors::json_fail(
            StatusCode::NOT_FOUND,
            "There is no user with that email address",
        );
    };

    let now = Utc::now();
    let token = trekly_auth::ResetToken::issue(now);
    user.start_password_reset(&token);
    if let Err(e) = services.users.save(user.clone()) {
        return errors::domain_error_to_response(environment, e);
    }

    let reset_url = format!(
        "http://{host}/api/v1/users/reset-password/{}",
        token.plaintext
    );
    let email = Email {
        to: user.email.clone(),
        subject: "Your password reset token (valid for 10 minutes)".to_string(),
        body: format!(
            "Forgot your password? Submit a PATCH request with your new password to {reset_url}. \
             If you didn't, please ignore this email."
        ),
    };

    match services.mailer.send(email) {
        Ok(()) => dto::success(
            StatusCode::OK,
            serde_json::json!({ "message": "Token sent to email!" }),
        ),
        Err(e) => {
            // Roll back so the stored digest can't outlive a mail we never sent.
            tracing::error!(error = %e, "reset email failed");
            user.clear_password_reset();
            if let Err(save_err) = services.users.save(user) {
                tracing::error!(error = %save_err, "reset rollback failed");
            }
            errors::json_fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "There was an error sending the email. Try again later!",
            )
        }
    }
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    dto::AppJson(body): dto::AppJson<dto::ResetPasswordRequest>,
) -> Response {
    let environment = services.config.environment;
    let now = Utc::now();
    let digest = reset_digest(&token);

    let user = services
        .users
        .find_one(|u| u.password_reset_digest.as_deref() == Some(digest.as_str()))
        .filter(|u| u.active && u.reset_token_matches(&token, now));
    let Some(mut user) = user else {
        return errors::json_fail(StatusCode::BAD_REQUEST, "Token is invalid or has expired");
    };

    if let Err(e) = user.set_password(&body.password, &body.password_confirm, now) {
        return errors::domain_error_to_response(environment, e);
    }
    user.clear_password_reset();
    if let Err(e) = services.users.save(user.clone()) {
        return errors::domain_error_to_response(environment, e);
    }

    send_session(&services, &user, StatusCode::OK, now)
}

// -------------------------
// Authenticated self-service
// -------------------------

pub async fn update_my_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    dto::AppJson(body): dto::AppJson<dto::UpdatePasswordRequest>,
) -> Response {
    let environment = services.config.environment;
    let mut user = current.into_user();

    if !user.password_matches(&body.password_current) {
        return errors::json_fail(StatusCode::UNAUTHORIZED, "Your current password is wrong");
    }

    let now = Utc::now();
    if let Err(e) = user.set_password(&body.password, &body.password_confirm, now) {
        return errors::domain_error_to_response(environment, e);
    }
    if let Err(e) = services.users.save(user.clone()) {
        return errors::domain_error_to_response(environment, e);
    }

    send_session(&services, &user, StatusCode::OK, now)
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    dto::success_doc(
        services.config.environment,
        StatusCode::OK,
        "user",
        current.user(),
    )
}

const SELF_UPDATABLE: [&str; 3] = ["name", "email", "photo"];

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    dto::AppJson(patch): dto::AppJson<Map<String, Value>>,
) -> Response {
    if patch.contains_key("password") || patch.contains_key("password_confirm") {
        return errors::json_fail(
            StatusCode::BAD_REQUEST,
            "This route is not for password updates. Please use /update-my-password",
        );
    }

    // Only profile fields; in particular, no role escalation through here.
    let filtered: Map<String, Value> = patch
        .into_iter()
        .filter(|(k, _)| SELF_UPDATABLE.contains(&k.as_str()))
        .collect();

    handlers::update_document(
        services.config.environment,
        &services.users,
        &current.id().to_string(),
        &filtered,
        "user",
    )
}

/// Soft delete: the account is deactivated, not removed.
pub async fn delete_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let mut user = current.into_user();
    user.deactivate();
    match services.users.save(user) {
        Ok(_) => dto::no_content(),
        Err(e) => errors::domain_error_to_response(services.config.environment, e),
    }
}

// -------------------------
// Admin CRUD
// -------------------------

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin]) {
        return resp;
    }
    let scope = vec![Predicate::eq("active", Value::Bool(true))];
    handlers::list_documents(&services.users, &scope, &params, "users")
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin]) {
        return resp;
    }
    errors::json_fail(
        StatusCode::INTERNAL_SERVER_ERROR,
        "This route is not defined! Please use /signup instead",
    )
}

/// Reads honor the soft-delete scope: a deactivated account is a 404.
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let environment = services.config.environment;
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin]) {
        return resp;
    }
    match handlers::parse_id(&id).and_then(|uid| services.users.require(uid)) {
        Ok(user) if user.active => {
            dto::success_doc(environment, StatusCode::OK, "user", &user)
        }
        Ok(_) => errors::domain_error_to_response(
            environment,
            DomainError::not_found("No document found with that ID"),
        ),
        Err(e) => errors::domain_error_to_response(environment, e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    dto::AppJson(patch): dto::AppJson<Map<String, Value>>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin]) {
        return resp;
    }
    handlers::update_document(
        services.config.environment,
        &services.users,
        &id,
        &patch,
        "user",
    )
}

/// Hard delete; admin only. Self-service deletion is the soft variant above.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::authorize(&services, current.user(), &[Role::Admin]) {
        return resp;
    }
    handlers::delete_document(services.config.environment, &services.users, &id)
}
