//! Repository implementations for the ledger and resource tables
//!
//! Repositories encapsulate SQL and map between database rows and domain
//! types. They borrow a connection from the caller's transaction and never
//! commit on their own.
//!
//! Queries are runtime-checked (`sqlx::query` / `query_as` with `FromRow`
//! rows), so the workspace builds without a live database.

pub mod ledger;
pub mod resources;

pub use ledger::LedgerRepository;
pub use resources::ResourceRepository;
