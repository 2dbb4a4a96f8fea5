use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Link embedded in verification emails; the token is appended as `?token=`.
    pub verification_base_url: String,
    pub email_relay_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_timeout: Duration,
    pub batch_max_concurrent_tasks: usize,
    pub batch_poll_interval: Duration,
    pub batch_lease: Duration,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "number-registry".to_string()),
            verification_base_url: env::var("VERIFICATION_BASE_URL")
                .context("VERIFICATION_BASE_URL must be set")?,
            email_relay_url: non_empty("EMAIL_RELAY_URL"),
            email_api_key: non_empty("EMAIL_API_KEY"),
            email_timeout: Duration::from_secs(parse_or("EMAIL_TIMEOUT_SECS", 30)?),
            batch_max_concurrent_tasks: parse_or("BATCH_MAX_CONCURRENT_TASKS", 4)?,
            batch_poll_interval: Duration::from_secs(parse_or("BATCH_POLL_INTERVAL_SECS", 5)?),
            batch_lease: Duration::from_secs(parse_or("BATCH_LEASE_SECS", 300)?),
            allowed_origins: split_list(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        _ => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
