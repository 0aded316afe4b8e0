//! Request middleware: the authentication chain and the per-IP rate limiter.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};

use trekly_core::{DomainError, DomainResult};
use trekly_domain::User;

use crate::app::{errors, services::AppServices};
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
}

/// Require a valid session; inserts [`CurrentUser`] into request extensions.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state.services, req.headers()) {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser::new(user));
            next.run(req).await
        }
        Err(err) => errors::domain_error_to_response(state.services.config.environment, err),
    }
}

/// The full verification chain; each failed step short-circuits to 401.
///
/// extract token -> verify signature/expiry -> resolve user (must still
/// exist and be active) -> reject tokens issued before the last password
/// change.
pub fn authenticate(services: &AppServices, headers: &HeaderMap) -> DomainResult<User> {
    let token = extract_token(headers).ok_or_else(|| {
        DomainError::unauthorized("You are not logged in! Please log in to get access")
    })?;

    let claims = services.tokens.verify(&token)?;

    let user = services
        .users
        .get(*claims.sub.as_uuid())
        .filter(|u| u.active)
        .ok_or_else(|| {
            DomainError::unauthorized("The user belonging to this token does no longer exist")
        })?;

    if user.changed_password_after(claims.issued_at()) {
        return Err(DomainError::unauthorized(
            "User recently changed password! Please log in again",
        ));
    }

    Ok(user)
}

/// Bearer header first, `jwt` cookie as fallback.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(header) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return Some(token.to_string());
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().strip_prefix("jwt="))
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Per-IP sliding-window request counter.
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit; false when the client is over its budget.
    ///
    /// Also drops entries for IPs whose window has fully drained, so the
    /// map stays bounded by the set of recently active clients.
    pub fn allow(&self, ip: IpAddr, now: DateTime<Utc>) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.retain(|_, stamps| {
            stamps.retain(|t| *t + self.window > now);
            !stamps.is_empty()
        });
        let stamps = hits.entry(ip).or_default();
        if stamps.len() >= self.max {
            return false;
        }
        stamps.push(now);
        true
    }

    #[cfg(test)]
    fn tracked_ips(&self) -> usize {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !limiter.allow(ip, Utc::now()) {
        return errors::json_fail(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests from this IP, please try again in an hour!",
        );
    }

    next.run(req).await
}
