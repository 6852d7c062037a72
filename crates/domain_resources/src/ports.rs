//! Resource Domain Ports
//!
//! Same transaction contract as the billing ledger: `lock_resource` holds an
//! exclusive row lock until the handle is committed or dropped, and writes
//! become visible only on commit.

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, PortError, ResourceId};

use crate::allocation::Allocation;
use crate::resource::Resource;
use crate::stock::StockMovement;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Source of resource transactions
#[async_trait]
pub trait ResourceStore: DomainPort + HealthCheckable {
    async fn begin(&self) -> Result<Box<dyn ResourceTx>, PortError>;
}

/// One open resource transaction
#[async_trait]
pub trait ResourceTx: Send {
    async fn insert_resource(&mut self, resource: &Resource) -> Result<(), PortError>;

    async fn find_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError>;

    /// Reads the resource and locks its row until commit or rollback
    async fn lock_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError>;

    async fn update_resource(&mut self, resource: &Resource) -> Result<(), PortError>;

    /// Active allocations of a resource
    async fn active_allocations(&mut self, resource_id: ResourceId) -> Result<Vec<Allocation>, PortError>;

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError>;

    async fn update_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError>;

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), PortError>;

    /// Movements of a resource, oldest first
    async fn movements(&mut self, resource_id: ResourceId) -> Result<Vec<StockMovement>, PortError>;

    async fn commit(&mut self) -> Result<(), PortError>;
}
