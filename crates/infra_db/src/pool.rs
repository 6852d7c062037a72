//! Connection pool and schema migrations

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

pub type DatabasePool = PgPool;

/// Pool settings plus the per-transaction lock wait bound
///
/// ```rust
/// use std::time::Duration;
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres://localhost/hospital")
///     .max_connections(20)
///     .lock_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.lock_timeout_ms(), Some(5000));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a free pooled connection before failing as transient
    pub acquire_timeout: Duration,
    /// Row-lock waits inside a ledger or resource transaction; `None` waits
    /// as long as PostgreSQL lets it
    pub lock_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            lock_timeout: Some(Duration::from_secs(10)),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The lock bound in whole milliseconds, as the adapters take it
    pub fn lock_timeout_ms(&self) -> Option<u64> {
        self.lock_timeout.map(|t| t.as_millis() as u64)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/hospital")
    }
}

/// Connects the pool
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` when no connection can be opened.
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        lock_timeout_ms = ?config.lock_timeout_ms(),
        "Database pool ready"
    );
    Ok(pool)
}

/// Applies the migrations embedded from the workspace `migrations/` directory
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(1));

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
        assert_eq!(config.lock_timeout_ms(), Some(10_000));
    }

    #[test]
    fn test_lock_timeout_can_be_disabled() {
        let config = DatabaseConfig::default().lock_timeout(None);
        assert_eq!(config.lock_timeout_ms(), None);
        assert_eq!(config.url, "postgres://localhost/hospital");
    }
}
