//! Store seam shared by the domain crates
//!
//! `domain_billing` and `domain_resources` each declare a store port
//! (`LedgerStore`, `ResourceStore`) whose implementations live elsewhere:
//! PostgreSQL in `infra_db`, in-memory behind each domain's `mock` feature.
//! Whatever the backend, failures cross the seam as [`PortError`].
//!
//! ```text
//!   AccountService / ResourceService
//!                 │
//!                 ▼
//!   LedgerStore / ResourceStore  (begin() -> transaction handle)
//!         ▲                    ▲
//!         │                    │
//!   PostgreSQL adapter    In-memory adapter
//!   (SELECT … FOR UPDATE) (per-row async locks)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a store adapter
///
/// `Connection`, `Timeout` and `LockContention` are transient: the
/// transaction was rolled back and nothing was written.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A write broke a unique or check constraint
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// Row lock not granted in time, or the transaction was chosen as a
    /// deadlock or serialization victim
    #[error("Lock contention: {message}")]
    LockContention {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Source>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        PortError::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn lock_contention(message: impl Into<String>) -> Self {
        PortError::LockContention {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Internal error keeping the adapter's own error as the source
    pub fn internal_from(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        PortError::Internal {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Safe to retry the whole operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::LockContention { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker for store ports; implementations are shared across tasks
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Unhealthy,
}

/// One adapter's answer to a readiness probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Adapters that can answer a readiness probe
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}
