//! Test Utilities Crate
//!
//! Shared test infrastructure for the hospital ledger workspace.
//!
//! # Modules
//!
//! - `fixtures`: Actors by role, amounts, patient references
//! - `builders`: Ledger scenarios built through the domain constructors
//! - `database`: testcontainers PostgreSQL with migrations applied
//! - `assertions`: Money and error-kind assertions
//! - `generators`: proptest strategies for amounts and ledger rows

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
