//! Database error types
//!
//! This module defines the error types that can occur during database operations,
//! classifies PostgreSQL failures into retryable and permanent ones, and
//! translates them into the port error the domain services understand.

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur during database operations
///
/// This enum captures all possible database-related errors, including
/// connection issues, query failures, lock contention and constraint
/// violations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish or keep a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check or exclusion constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure, deadlock, or lock not available
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped back to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("PatientAccount", "ACC-123");
    /// assert!(error.to_string().contains("PatientAccount"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Checks if retrying the whole transaction may succeed
    pub fn is_transient(&self) -> bool {
        self.is_connection_error() || matches!(self, DatabaseError::LockContention(_))
    }
}

/// Maps a PostgreSQL SQLSTATE code to an error variant
///
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
fn classify_sqlstate(code: &str, message: String) -> DatabaseError {
    match code {
        "23505" => DatabaseError::DuplicateEntry(message),
        "23503" => DatabaseError::ForeignKeyViolation(message),
        "23514" | "23P01" => DatabaseError::ConstraintViolation(message),
        // serialization_failure, deadlock_detected, lock_not_available
        "40001" | "40P01" | "55P03" => DatabaseError::LockContention(message),
        // connection exceptions and admin shutdown
        c if c.starts_with("08") || c.starts_with("57P") => DatabaseError::ConnectionFailed(message),
        _ => DatabaseError::QueryFailed(message),
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// This analyzes the SQLx error and maps it to the appropriate
/// DatabaseError variant based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) => classify_sqlstate(code.as_ref(), db_err.message().to_string()),
                None => DatabaseError::QueryFailed(db_err.message().to_string()),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Migrate(e) => DatabaseError::MigrationFailed(e.to_string()),
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

/// Translates database errors to port errors at the adapter seam
///
/// - connection loss and pool exhaustion -> `PortError::Connection`
/// - lock contention -> `PortError::LockContention`
/// - constraint violations -> `PortError::Conflict`
/// - everything else -> `PortError::Internal`
impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::timeout("acquire connection", 0),
            DatabaseError::LockContention(message) => PortError::lock_contention(message),
            DatabaseError::NotFound(message) => PortError::not_found("record", message),
            e if e.is_constraint_violation() => PortError::conflict(e.to_string()),
            other => PortError::internal_from(other),
        }
    }
}

/// Converts an SQLx error straight into a port error
pub(crate) fn port_error(error: sqlx::Error) -> PortError {
    PortError::from(DatabaseError::from(&error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_classification() {
        assert!(classify_sqlstate("40001", "could not serialize".into()).is_transient());
        assert!(classify_sqlstate("40P01", "deadlock detected".into()).is_transient());
        assert!(classify_sqlstate("55P03", "lock not available".into()).is_transient());
        assert!(classify_sqlstate("08006", "connection failure".into()).is_transient());
        assert!(classify_sqlstate("23505", "duplicate key".into()).is_constraint_violation());
        assert!(classify_sqlstate("23514", "check violation".into()).is_constraint_violation());
        assert!(!classify_sqlstate("42P01", "undefined table".into()).is_transient());
    }

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(DatabaseError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(DatabaseError::from(sqlx::Error::PoolClosed).is_transient());
        assert!(DatabaseError::from(sqlx::Error::RowNotFound).is_not_found());
    }

    #[test]
    fn test_port_error_translation() {
        let port: PortError = DatabaseError::LockContention("deadlock".into()).into();
        assert!(port.is_transient());

        let port: PortError = DatabaseError::PoolExhausted.into();
        assert!(port.is_transient());

        let port: PortError = DatabaseError::DuplicateEntry("receivables_account_id_key".into()).into();
        assert!(matches!(port, PortError::Conflict { .. }));

        let port: PortError = DatabaseError::SerializationError("bad kind".into()).into();
        assert!(matches!(port, PortError::Internal { .. }));
        assert!(!port.is_transient());
    }
}
