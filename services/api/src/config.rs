//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::FixedOffset;
use companion_core::calendar::home_offset;
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

/// Which implementation backs the relational and document stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub orchestrator_base_url: String,
    pub orchestrator_timeout: Duration,
    pub session_secret: String,
    /// Adds the `Secure` attribute to cookies.
    pub production: bool,
    pub home_offset: FixedOffset,
    pub cors_origin: String,
}

const MIN_SECRET_LEN: usize = 32;

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and storage ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Orchestration service ---
        let orchestrator_base_url = std::env::var("ORCHESTRATOR_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("ORCHESTRATOR_BASE_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let orchestrator_timeout =
            Duration::from_secs(parse_var("ORCHESTRATOR_TIMEOUT_SECS", 120u64)?);

        // --- Sessions ---
        let session_secret = std::env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::MissingVar("SESSION_SECRET".to_string()))?;
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "SESSION_SECRET".to_string(),
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }
        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let offset_hours = parse_var("HOME_UTC_OFFSET_HOURS", 9i32)?;
        let home_offset = home_offset(offset_hours).ok_or_else(|| {
            ConfigError::InvalidValue(
                "HOME_UTC_OFFSET_HOURS".to_string(),
                format!("{} is out of range", offset_hours),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            storage_backend,
            database_url,
            database_max_connections,
            log_level,
            orchestrator_base_url,
            orchestrator_timeout,
            session_secret,
            production,
            home_offset,
            cors_origin,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
