//! In-memory resource store
//!
//! Row locks, private pending writes and commit-time constraint checks
//! mirror the PostgreSQL schema: stock never negative and at most one active
//! allocation per resource.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, ResourceId};

use super::{ResourceStore, ResourceTx};
use crate::allocation::Allocation;
use crate::resource::Resource;
use crate::stock::StockMovement;

#[derive(Debug, Clone, Default)]
struct Tables {
    resources: HashMap<ResourceId, Resource>,
    allocations: Vec<Allocation>,
    movements: Vec<StockMovement>,
}

#[derive(Debug, Clone)]
enum Write {
    InsertResource(Resource),
    UpdateResource(Resource),
    InsertAllocation(Allocation),
    UpdateAllocation(Allocation),
    Movement(StockMovement),
}

impl Tables {
    fn apply(&mut self, write: Write) -> Result<(), PortError> {
        match write {
            Write::InsertResource(resource) => {
                if self.resources.contains_key(&resource.id) {
                    return Err(PortError::conflict(format!("resource {} already exists", resource.id)));
                }
                Self::check_stock(&resource)?;
                self.resources.insert(resource.id, resource);
            }
            Write::UpdateResource(resource) => {
                if !self.resources.contains_key(&resource.id) {
                    return Err(PortError::not_found("Resource", resource.id));
                }
                Self::check_stock(&resource)?;
                self.resources.insert(resource.id, resource);
            }
            Write::InsertAllocation(allocation) => {
                if !self.resources.contains_key(&allocation.resource_id) {
                    return Err(PortError::conflict(format!("resource {} does not exist", allocation.resource_id)));
                }
                if allocation.active
                    && self
                        .allocations
                        .iter()
                        .any(|a| a.active && a.resource_id == allocation.resource_id)
                {
                    return Err(PortError::conflict(format!(
                        "resource {} already has an active allocation",
                        allocation.resource_id
                    )));
                }
                self.allocations.push(allocation);
            }
            Write::UpdateAllocation(allocation) => {
                let slot = self
                    .allocations
                    .iter_mut()
                    .find(|a| a.id == allocation.id)
                    .ok_or_else(|| PortError::not_found("Allocation", allocation.id))?;
                *slot = allocation;
            }
            Write::Movement(movement) => {
                if !self.resources.contains_key(&movement.resource_id) {
                    return Err(PortError::conflict(format!("resource {} does not exist", movement.resource_id)));
                }
                self.movements.push(movement);
            }
        }
        Ok(())
    }

    fn check_stock(resource: &Resource) -> Result<(), PortError> {
        if resource.stock < 0 {
            return Err(PortError::conflict(format!("stock of {} would be negative", resource.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<ResourceId, Arc<Mutex<()>>>>,
    unavailable: AtomicBool,
}

/// In-memory [`ResourceStore`] for tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryResourceStore {
    shared: Arc<Shared>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `begin` fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of committed active allocations for `resource_id`
    pub async fn active_allocation_count(&self, resource_id: ResourceId) -> usize {
        self.shared
            .tables
            .lock()
            .await
            .allocations
            .iter()
            .filter(|a| a.active && a.resource_id == resource_id)
            .count()
    }
}

impl DomainPort for InMemoryResourceStore {}

#[async_trait]
impl HealthCheckable for InMemoryResourceStore {
    async fn health_check(&self) -> HealthCheckResult {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            HealthCheckResult::unhealthy("in-memory-resources", 0, "store marked unavailable")
        } else {
            HealthCheckResult::healthy("in-memory-resources", 0)
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn begin(&self) -> Result<Box<dyn ResourceTx>, PortError> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::connection("in-memory resource store is unavailable"));
        }
        Ok(Box::new(InMemoryResourceTx {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            pending: Vec::new(),
        }))
    }
}

struct InMemoryResourceTx {
    shared: Arc<Shared>,
    held: HashMap<ResourceId, OwnedMutexGuard<()>>,
    pending: Vec<Write>,
}

impl InMemoryResourceTx {
    async fn view(&self) -> Tables {
        tokio::task::yield_now().await;
        let mut view = self.shared.tables.lock().await.clone();
        for write in &self.pending {
            let _ = view.apply(write.clone());
        }
        view
    }

    async fn stage(&mut self, write: Write) -> Result<(), PortError> {
        self.view().await.apply(write.clone())?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl ResourceTx for InMemoryResourceTx {
    async fn insert_resource(&mut self, resource: &Resource) -> Result<(), PortError> {
        self.stage(Write::InsertResource(resource.clone())).await
    }

    async fn find_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError> {
        Ok(self.view().await.resources.get(&id).cloned())
    }

    async fn lock_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError> {
        if !self.held.contains_key(&id) {
            let row = {
                let mut locks = self.shared.row_locks.lock().await;
                Arc::clone(locks.entry(id).or_default())
            };
            let guard = row.lock_owned().await;
            self.held.insert(id, guard);
        }
        self.find_resource(id).await
    }

    async fn update_resource(&mut self, resource: &Resource) -> Result<(), PortError> {
        self.stage(Write::UpdateResource(resource.clone())).await
    }

    async fn active_allocations(&mut self, resource_id: ResourceId) -> Result<Vec<Allocation>, PortError> {
        let view = self.view().await;
        Ok(view
            .allocations
            .into_iter()
            .filter(|a| a.active && a.resource_id == resource_id)
            .collect())
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError> {
        self.stage(Write::InsertAllocation(allocation.clone())).await
    }

    async fn update_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError> {
        self.stage(Write::UpdateAllocation(allocation.clone())).await
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), PortError> {
        self.stage(Write::Movement(movement.clone())).await
    }

    async fn movements(&mut self, resource_id: ResourceId) -> Result<Vec<StockMovement>, PortError> {
        let view = self.view().await;
        Ok(view
            .movements
            .into_iter()
            .filter(|m| m.resource_id == resource_id)
            .collect())
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        {
            let mut tables = self.shared.tables.lock().await;
            let mut next = tables.clone();
            for write in self.pending.drain(..) {
                next.apply(write)?;
            }
            *tables = next;
        }
        self.held.clear();
        Ok(())
    }
}
