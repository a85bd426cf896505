//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

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
    /// Published CSV export of the catalog sheet.
    pub sheet_url: String,
    /// How long a fetched catalog stays fresh before a lazy refresh.
    pub sheet_ttl: Duration,
    /// The account that is always treated as owner, regardless of its
    /// stored role. Optional; without it owners exist only if stored.
    pub owner_email: Option<String>,
    /// Origin allowed by CORS, for the browser frontend.
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Catalog Sheet Settings ---
        let sheet_url = std::env::var("SHEET_URL")
            .map_err(|_| ConfigError::MissingVar("SHEET_URL".to_string()))?;

        let sheet_ttl_str =
            std::env::var("SHEET_TTL_SECS").unwrap_or_else(|_| "600".to_string());
        let sheet_ttl_secs = sheet_ttl_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "SHEET_TTL_SECS".to_string(),
                format!("'{}' is not a number of seconds", sheet_ttl_str),
            )
        })?;
        let sheet_ttl = Duration::from_secs(sheet_ttl_secs);

        // --- Load Privileged-Account and CORS Settings ---
        let owner_email = std::env::var("OWNER_EMAIL").ok().filter(|s| !s.is_empty());
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            sheet_url,
            sheet_ttl,
            owner_email,
            cors_origin,
        })
    }
}
