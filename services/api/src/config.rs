//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::ops::RangeInclusive;
use tracing::Level;

/// Accepted session lifetimes, in days.
pub const SESSION_TTL_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub db_max_connections: u32,
    pub storage_root: PathBuf,
    pub google_books_api_url: String,
    pub metadata_timeout_secs: u64,
    pub events_webhook_url: Option<String>,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    pub api_prefix: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:8000"))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", &var_or("DB_MAX_CONNECTIONS", "5"))?;

        // --- Collaborators ---
        let storage_root = PathBuf::from(var_or("STORAGE_ROOT", "./storage"));
        let google_books_api_url = var_or(
            "GOOGLE_BOOKS_API_URL",
            "https://www.googleapis.com/books/v1/volumes",
        );
        let metadata_timeout_secs =
            parse_var("METADATA_TIMEOUT_SECS", &var_or("METADATA_TIMEOUT_SECS", "10"))?;
        let events_webhook_url = lookup("EVENTS_WEBHOOK_URL").filter(|url| !url.trim().is_empty());

        // --- HTTP Surface ---
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");
        let session_ttl_days: i64 =
            parse_var("SESSION_TTL_DAYS", &var_or("SESSION_TTL_DAYS", "30"))?;
        if !SESSION_TTL_DAYS_RANGE.contains(&session_ttl_days) {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                format!(
                    "{} is outside {}..={}",
                    session_ttl_days,
                    SESSION_TTL_DAYS_RANGE.start(),
                    SESSION_TTL_DAYS_RANGE.end()
                ),
            ));
        }
        let api_prefix = var_or("API_PREFIX", "/api/v1");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            db_max_connections,
            storage_root,
            google_books_api_url,
            metadata_timeout_secs,
            events_webhook_url,
            cors_origin,
            session_ttl_days,
            api_prefix,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
