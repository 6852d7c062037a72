//! Resource service
//!
//! Every reservation, release and restock locks the resource row first, so
//! two requests for the last unit or the same room serialize and only one
//! wins.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{Actor, ResourceId};

use crate::error::ResourceError;
use crate::ports::{ResourceStore, ResourceTx};
use crate::resource::{Reservation, ReservationRequest, Resource, ResourceKind};
use crate::stock::StockMovement;

/// Application service for rooms, theaters and stock
#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
}

impl ResourceService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Registers a resource; a positive initial stock is journalled
    #[instrument(skip(self, actor), fields(actor = %actor.reference()))]
    pub async fn register_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        initial_stock: i64,
        actor: &Actor,
    ) -> Result<Resource, ResourceError> {
        if initial_stock < 0 {
            return Err(ResourceError::invalid(format!(
                "initial stock must be non-negative, got {}",
                initial_stock
            )));
        }
        let mut resource = Resource::register(kind, name, 0)?;

        let mut tx = self.store.begin().await?;
        tx.insert_resource(&resource).await?;
        if initial_stock > 0 {
            let movement = resource.restock(initial_stock, "initial stock", actor)?;
            tx.update_resource(&resource).await?;
            tx.insert_movement(&movement).await?;
        }
        tx.commit().await?;

        info!(resource_id = %resource.id, kind = %kind, "Resource registered");
        Ok(resource)
    }

    /// Reads a resource
    #[instrument(skip(self))]
    pub async fn resource(&self, resource_id: ResourceId) -> Result<Resource, ResourceError> {
        let mut tx = self.store.begin().await?;
        tx.find_resource(resource_id)
            .await?
            .ok_or(ResourceError::NotFound(resource_id))
    }

    /// Allocates a room or theater, or deducts stock
    #[instrument(skip(self, request, actor), fields(actor = %actor.reference()))]
    pub async fn reserve(
        &self,
        resource_id: ResourceId,
        request: ReservationRequest,
        actor: &Actor,
    ) -> Result<Reservation, ResourceError> {
        let mut tx = self.store.begin().await?;
        let mut resource = Self::locked(tx.as_mut(), resource_id).await?;
        let active = if resource.kind.is_allocatable() {
            tx.active_allocations(resource_id).await?
        } else {
            Vec::new()
        };

        let reservation = resource.reserve(&request, &active, actor).map_err(|e| {
            warn!(error = %e, "Reservation rejected");
            e
        })?;

        tx.update_resource(&resource).await?;
        match &reservation {
            Reservation::Allocation(allocation) => tx.insert_allocation(allocation).await?,
            Reservation::StockDeduction(movement) => tx.insert_movement(movement).await?,
        }
        tx.commit().await?;

        match &reservation {
            Reservation::Allocation(allocation) => {
                info!(allocation_id = %allocation.id, purpose = allocation.purpose.as_str(), "Resource allocated")
            }
            Reservation::StockDeduction(movement) => {
                info!(quantity = -movement.quantity_delta, balance_after = movement.balance_after, "Stock deducted")
            }
        }
        Ok(reservation)
    }

    /// Frees an occupied room or theater; a no-op when already free
    #[instrument(skip(self, actor), fields(actor = %actor.reference()))]
    pub async fn release(&self, resource_id: ResourceId, actor: &Actor) -> Result<Resource, ResourceError> {
        let mut tx = self.store.begin().await?;
        let mut resource = Self::locked(tx.as_mut(), resource_id).await?;
        if !resource.kind.is_allocatable() {
            return Err(ResourceError::invalid("stock items are not released"));
        }

        let now = Utc::now();
        let mut released = 0;
        for mut allocation in tx.active_allocations(resource_id).await? {
            allocation.release(now);
            tx.update_allocation(&allocation).await?;
            released += 1;
        }
        let freed = resource.release();
        if freed || released > 0 {
            tx.update_resource(&resource).await?;
            tx.commit().await?;
            info!(allocations = released, "Resource released");
        } else {
            debug!("Release on an unoccupied resource; nothing to do");
        }
        Ok(resource)
    }

    /// Adds units to a stock item
    #[instrument(skip(self, actor), fields(actor = %actor.reference()))]
    pub async fn restock(
        &self,
        resource_id: ResourceId,
        quantity: i64,
        reason: &str,
        actor: &Actor,
    ) -> Result<StockMovement, ResourceError> {
        let mut tx = self.store.begin().await?;
        let mut resource = Self::locked(tx.as_mut(), resource_id).await?;

        let movement = resource.restock(quantity, reason, actor)?;
        tx.update_resource(&resource).await?;
        tx.insert_movement(&movement).await?;
        tx.commit().await?;

        info!(quantity, balance_after = movement.balance_after, "Stock replenished");
        Ok(movement)
    }

    /// Moves a resource into or out of maintenance
    #[instrument(skip(self))]
    pub async fn set_maintenance(&self, resource_id: ResourceId, maintenance: bool) -> Result<Resource, ResourceError> {
        let mut tx = self.store.begin().await?;
        let mut resource = Self::locked(tx.as_mut(), resource_id).await?;

        if resource.set_maintenance(maintenance)? {
            tx.update_resource(&resource).await?;
            tx.commit().await?;
            info!(state = %resource.state, "Maintenance state changed");
        }
        Ok(resource)
    }

    /// Stock journal of a resource, oldest first
    #[instrument(skip(self))]
    pub async fn movements(&self, resource_id: ResourceId) -> Result<Vec<StockMovement>, ResourceError> {
        let mut tx = self.store.begin().await?;
        if tx.find_resource(resource_id).await?.is_none() {
            return Err(ResourceError::NotFound(resource_id));
        }
        Ok(tx.movements(resource_id).await?)
    }

    async fn locked(tx: &mut dyn ResourceTx, resource_id: ResourceId) -> Result<Resource, ResourceError> {
        tx.lock_resource(resource_id)
            .await?
            .ok_or(ResourceError::NotFound(resource_id))
    }
}
