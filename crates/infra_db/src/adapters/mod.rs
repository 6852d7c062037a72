//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting the billing and resource transaction ports to PostgreSQL.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements the domain's store and transaction traits
//! - Delegates SQL to the repository layer
//! - Translates `DatabaseError` into `PortError` at the seam

pub mod ledger;
pub mod resources;

pub use ledger::{PostgresLedgerAdapter, PostgresLedgerTx};
pub use resources::{PostgresResourceAdapter, PostgresResourceTx};

use sqlx::{PgPool, Postgres, Transaction};

use core_kernel::{HealthCheckResult, PortError};

use crate::error::port_error;

/// Opens a transaction, bounding row-lock waits when a timeout is set
///
/// A lock wait past the timeout fails with SQLSTATE 55P03, which surfaces
/// as a transient `PortError::LockContention`.
pub(crate) async fn begin_with_lock_timeout(
    pool: &PgPool,
    lock_timeout_ms: Option<u64>,
) -> Result<Transaction<'static, Postgres>, PortError> {
    let mut tx = pool.begin().await.map_err(port_error)?;
    if let Some(ms) = lock_timeout_ms {
        // SET does not accept bind parameters
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", ms))
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
    }
    Ok(tx)
}

/// `SELECT 1` through the pool, timed
pub(crate) async fn probe(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {}", e)),
    }
}
