//! Infrastructure Database Layer
//!
//! PostgreSQL implementations of the billing and resource transaction ports,
//! built on SQLx.
//!
//! # Architecture
//!
//! - `repositories` hold the SQL and the row types
//! - `adapters` implement `LedgerStore` / `ResourceStore` on top of them
//! - `error` classifies PostgreSQL failures and translates them to `PortError`
//!
//! Check-then-act sequences in the domain services rely on the row locks
//! taken here (`SELECT … FOR UPDATE`); no balance or resource state is
//! cached in process.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let config = DatabaseConfig::new("postgres://localhost/hospital");
//! let pool = create_pool(config.clone()).await?;
//! run_migrations(&pool).await?;
//! let ledger = Arc::new(PostgresLedgerAdapter::new(pool).with_lock_timeout(config.lock_timeout_ms()));
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, run_migrations};
pub use error::DatabaseError;
pub use adapters::{PostgresLedgerAdapter, PostgresResourceAdapter};
