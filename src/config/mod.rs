//! Application configuration loaded from environment.

use std::net::SocketAddr;
use std::time::Duration;

use axum_extra::extract::cookie::SameSite;

const DEV_ACCESS_SECRET: &str = "vidshare_access_secret_change_in_production";
const DEV_REFRESH_SECRET: &str = "vidshare_refresh_secret_change_in_production";

/// Upper bound for every configured duration: ten years.
const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Deployment environment. Controls the `Secure` cookie flag and secret requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:8000`).
    pub server_addr: SocketAddr,
    /// PostgreSQL connection URL. When unset the in-memory store is used.
    pub database_url: Option<String>,
    /// HMAC secret for access tokens.
    pub access_token_secret: String,
    /// HMAC secret for refresh tokens. Must differ from the access secret.
    pub refresh_token_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub environment: Environment,
    /// `SameSite` attribute for the credential cookies.
    pub cookie_same_site: SameSite,
    /// Allowed CORS origin; any origin when unset.
    pub cors_origin: Option<String>,
    pub request_timeout: Duration,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr: SocketAddr = var("SERVER_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8000".to_string())
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let environment = match var("APP_ENV").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => return Err(ConfigLoadError::InvalidEnvironment(other.to_string())),
        };

        let access_token_secret = secret(&var, "ACCESS_TOKEN_SECRET", DEV_ACCESS_SECRET, environment)?;
        let refresh_token_secret =
            secret(&var, "REFRESH_TOKEN_SECRET", DEV_REFRESH_SECRET, environment)?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigLoadError::SharedTokenSecret);
        }

        let access_token_ttl = ttl(&var, "ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_token_ttl = ttl(&var, "REFRESH_TOKEN_TTL_SECS", 10 * 24 * 60 * 60)?;

        let cookie_same_site = match var("COOKIE_SAME_SITE") {
            None => SameSite::Lax,
            Some(v) => parse_same_site(&v)?,
        };

        let request_timeout = Duration::from_secs(seconds(&var, "REQUEST_TIMEOUT_SECS", 30)? as u64);

        Ok(Self {
            server_addr,
            database_url: var("DATABASE_URL").filter(|v| !v.is_empty()),
            access_token_secret,
            refresh_token_secret,
            access_token_ttl,
            refresh_token_ttl,
            environment,
            cookie_same_site,
            cors_origin: var("CORS_ORIGIN").filter(|v| !v.is_empty() && v != "*"),
            request_timeout,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn secret<F>(var: &F, key: &'static str, dev_default: &str, env: Environment) -> Result<String, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).filter(|v| !v.is_empty()) {
        Some(v) => Ok(v),
        None if env.is_production() => Err(ConfigLoadError::MissingSecret(key)),
        None => Ok(dev_default.to_string()),
    }
}

fn seconds<F>(var: &F, key: &'static str, default: i64) -> Result<i64, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(v) => match v.trim().parse::<i64>() {
            Ok(n) if n > 0 && n <= MAX_DURATION_SECS => Ok(n),
            _ => Err(ConfigLoadError::InvalidDuration(key)),
        },
    }
}

fn ttl<F>(var: &F, key: &'static str, default: i64) -> Result<chrono::Duration, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    chrono::Duration::try_seconds(seconds(var, key, default)?)
        .ok_or(ConfigLoadError::InvalidDuration(key))
}

fn parse_same_site(value: &str) -> Result<SameSite, ConfigLoadError> {
    match value.trim().to_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        other => Err(ConfigLoadError::InvalidSameSite(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("Invalid APP_ENV: {0}")]
    InvalidEnvironment(String),
    #[error("{0} is required in production")]
    MissingSecret(&'static str),
    #[error("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ")]
    SharedTokenSecret,
    #[error("{0} must be a positive number of seconds, at most ten years")]
    InvalidDuration(&'static str),
    #[error("Invalid COOKIE_SAME_SITE: {0}")]
    InvalidSameSite(String),
}
