//! Immutable process configuration, built once from the environment.

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub jwt_secret: String,
    /// Session token lifetime.
    pub jwt_ttl: Duration,
    /// Sliding-window rate limit applied to `/api` routes, per client IP.
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let environment = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let jwt_ttl_days = std::env::var("JWT_EXPIRES_IN_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(90);

        Self {
            environment,
            port,
            jwt_secret,
            jwt_ttl: Duration::days(jwt_ttl_days),
            rate_limit_max: 100,
            rate_limit_window: Duration::hours(1),
        }
    }

    /// Session cookies carry `Secure` only when serving over TLS.
    pub fn cookie_secure(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            environment: Environment::Development,
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl: Duration::days(90),
            rate_limit_max: 100,
            rate_limit_window: Duration::hours(1),
        }
    }
}
