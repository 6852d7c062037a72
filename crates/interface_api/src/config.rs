//! API configuration

use serde::Deserialize;

/// API configuration
///
/// Every field has a default; environment variables prefixed with `API_`
/// override them (`API_PORT=9090`, `API_LEGACY_ADVANCE_FALLBACK=false`).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds, for tokens minted by `auth::create_token`
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Pool upper bound
    pub db_max_connections: u32,
    /// Pool lower bound
    pub db_min_connections: u32,
    /// Row-lock wait bound in milliseconds; 0 waits forever
    pub db_lock_timeout_ms: u64,
    /// Use an account's legacy advance field when it has no advance entries
    pub legacy_advance_fallback: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/hospital".to_string(),
            log_level: "info".to_string(),
            db_max_connections: 10,
            db_min_connections: 2,
            db_lock_timeout_ms: 10_000,
            legacy_advance_fallback: true,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the environment over the defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("db_max_connections", defaults.db_max_connections)?
            .set_default("db_min_connections", defaults.db_min_connections)?
            .set_default("db_lock_timeout_ms", defaults.db_lock_timeout_ms)?
            .set_default("legacy_advance_fallback", defaults.legacy_advance_fallback)?
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Lock timeout as handed to the database adapters
    pub fn lock_timeout_ms(&self) -> Option<u64> {
        (self.db_lock_timeout_ms > 0).then_some(self.db_lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert!(config.legacy_advance_fallback);
        assert_eq!(config.lock_timeout_ms(), Some(10_000));
    }

    #[test]
    fn test_zero_lock_timeout_disables_bound() {
        let config = ApiConfig {
            db_lock_timeout_ms: 0,
            ..ApiConfig::default()
        };
        assert_eq!(config.lock_timeout_ms(), None);
    }
}
