//! Resources Domain - Reservation Guard
//!
//! Guards the hospital's physical resources against double booking:
//!
//! - **Rooms and operating theaters** hold at most one active allocation;
//!   a reservation requires an available resource and no overlapping
//!   active allocation.
//! - **Stock items** are deducted unit by unit and never go below zero;
//!   every deduction and restock is journalled as a [`StockMovement`].
//!
//! Check-then-act sequences run under the resource's row lock inside one
//! store transaction.

pub mod resource;
pub mod allocation;
pub mod stock;
pub mod ports;
pub mod service;
pub mod error;

pub use resource::{Reservation, ReservationRequest, Resource, ResourceKind, ResourceState};
pub use allocation::{Allocation, AllocationPurpose, IntervalRequest};
pub use stock::StockMovement;
pub use ports::{ResourceStore, ResourceTx};
pub use service::ResourceService;
pub use error::ResourceError;
