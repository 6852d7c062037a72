//! Core Kernel - Foundational types for the hospital account ledger
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money types with exact decimal arithmetic
//! - Strongly-typed identifiers
//! - Actor identity and roles, as supplied by the authentication layer
//! - The domain error taxonomy and the port error used at adapter seams

pub mod money;
pub mod identifiers;
pub mod actor;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    PatientAccountId, LedgerEntryId, PaymentId, ReceivableId, ReceivablePaymentId,
    ResourceId, AllocationId, StockMovementId,
};
pub use actor::{Actor, Role};
pub use error::{CoreError, ErrorKind};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
