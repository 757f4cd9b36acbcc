//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Minimum accepted length of `JWT_SECRET`, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;
/// Upper bound for `TOKEN_TTL_HOURS`: one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the Cloudinary image store.
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

/// Argon2 work factor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    /// The `argon2` crate's recommended defaults.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub token_leeway_secs: u64,
    pub password_hash: PasswordHashConfig,
    pub max_upload_bytes: usize,
    pub cors_allowed_origin: Option<HeaderValue>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub ai_worker_url: Option<String>,
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
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;
        let db_max_connections = parsed_or("DB_MAX_CONNECTIONS", 5)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Auth Settings ---
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes long", MIN_JWT_SECRET_LEN),
            ));
        }
        let token_ttl_hours = check_token_ttl(parsed_or("TOKEN_TTL_HOURS", 24)?)?;
        let token_leeway_secs = parsed_or("TOKEN_LEEWAY_SECS", 0)?;

        let defaults = PasswordHashConfig::default();
        let password_hash = PasswordHashConfig {
            memory_kib: parsed_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parsed_or("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parsed_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        // --- Load Upload and Collaborator Settings ---
        let max_upload_bytes = parsed_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let cors_allowed_origin = optional("CORS_ALLOWED_ORIGIN")
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| {
                    ConfigError::InvalidValue("CORS_ALLOWED_ORIGIN".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let cloudinary = match (
            optional("CLOUDINARY_CLOUD_NAME"),
            optional("CLOUDINARY_API_KEY"),
            optional("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: optional("CLOUDINARY_FOLDER").unwrap_or_else(|| "neurostudy".to_string()),
            }),
            _ => None,
        };

        let ai_worker_url = optional("AI_WORKER_URL").map(|url| url.trim_end_matches('/').to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            jwt_secret,
            token_ttl_hours,
            token_leeway_secs,
            password_hash,
            max_upload_bytes,
            cors_allowed_origin,
            cloudinary,
            ai_worker_url,
        })
    }
}

fn check_token_ttl(hours: i64) -> Result<i64, ConfigError> {
    if hours <= 0 || hours > MAX_TOKEN_TTL_HOURS {
        return Err(ConfigError::InvalidValue(
            "TOKEN_TTL_HOURS".to_string(),
            format!("must be between 1 and {}", MAX_TOKEN_TTL_HOURS),
        ));
    }
    Ok(hours)
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

/// Reads a variable, treating an empty value as unset.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
