//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use achievement_core::RolePermissions;
use axum::http::HeaderValue;
use tracing::Level;

/// HS256 keys shorter than this are refused.
const MIN_JWT_SECRET_BYTES: usize = 32;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub document_database_url: String,
    pub log_level: Level,
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub request_timeout: Duration,
    pub store_timeout: Duration,
    pub role_permissions_file: Option<PathBuf>,
    pub cors_origin: HeaderValue,
}

// The signing key stays out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("role_permissions_file", &self.role_permissions_file)
            .field("cors_origin", &self.cors_origin)
            .finish_non_exhaustive()
    }
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

    /// Builds the configuration from any key lookup. `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and database settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let document_database_url =
            lookup("DOCUMENT_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Token settings ---
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?
            .into_bytes();
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {MIN_JWT_SECRET_BYTES} bytes"),
            ));
        }
        let access_token_ttl =
            chrono::Duration::hours(number(&lookup, "ACCESS_TOKEN_TTL_HOURS", 24)? as i64);
        let refresh_token_ttl =
            chrono::Duration::hours(number(&lookup, "REFRESH_TOKEN_TTL_HOURS", 168)? as i64);

        // --- Timeouts ---
        let request_timeout = Duration::from_secs(number(&lookup, "REQUEST_TIMEOUT_SECS", 15)?);
        let store_timeout = Duration::from_secs(number(&lookup, "STORE_TIMEOUT_SECS", 5)?);

        // --- Access control and CORS ---
        let role_permissions_file = lookup("ROLE_PERMISSIONS_FILE").map(PathBuf::from);
        let cors_origin_str =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_origin = HeaderValue::from_str(&cors_origin_str)
            .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            database_url,
            document_database_url,
            log_level,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            request_timeout,
            store_timeout,
            role_permissions_file,
            cors_origin,
        })
    }

    /// The role table from `ROLE_PERMISSIONS_FILE`, or the built-in defaults.
    pub fn role_permissions(&self) -> Result<RolePermissions, ConfigError> {
        let Some(path) = &self.role_permissions_file else {
            return Ok(RolePermissions::defaults());
        };
        let invalid = |reason: String| {
            ConfigError::InvalidValue("ROLE_PERMISSIONS_FILE".to_string(), reason)
        };
        let json = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("{}: {e}", path.display())))?;
        RolePermissions::from_json(&json).map_err(|e| invalid(format!("{}: {e}", path.display())))
    }
}

/// Reads a positive integer variable, falling back to `default` when unset.
fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{raw}' is not a positive whole number"),
            )),
            Ok(value) => Ok(value),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-bytes";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/prestasi"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.document_database_url, config.database_url);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.access_token_ttl, chrono::Duration::hours(24));
        assert_eq!(config.refresh_token_ttl, chrono::Duration::days(7));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.role_permissions().unwrap(), RolePermissions::defaults());
    }

    #[test]
    fn required_values_are_enforced() {
        assert!(matches!(
            load(&[("JWT_SECRET", SECRET)]),
            Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://localhost/prestasi")]),
            Err(ConfigError::MissingVar(var)) if var == "JWT_SECRET"
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://localhost/prestasi"), ("JWT_SECRET", "short")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "JWT_SECRET"
        ));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        for raw in ["0", "-3", "soon"] {
            let result = load(&[
                ("DATABASE_URL", "postgres://localhost/prestasi"),
                ("JWT_SECRET", SECRET),
                ("STORE_TIMEOUT_SECS", raw),
            ]);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref var, _)) if var == "STORE_TIMEOUT_SECS"),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn missing_permissions_file_is_an_error() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/prestasi"),
            ("JWT_SECRET", SECRET),
            ("ROLE_PERMISSIONS_FILE", "/nonexistent/roles.json"),
        ])
        .unwrap();

        assert!(matches!(config.role_permissions(), Err(ConfigError::InvalidValue(..))));
    }
}
