//! PostgreSQL Resource Adapter
//!
//! Implements the `ResourceStore` port. `lock_resource` takes the resource
//! row lock; the partial unique index on active allocations backs the
//! single-allocation rule even if a caller skips the lock.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::instrument;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, ResourceId};
use domain_resources::{Allocation, Resource, ResourceStore, ResourceTx, StockMovement};

use crate::adapters::begin_with_lock_timeout;
use crate::error::port_error;
use crate::repositories::ResourceRepository;

/// PostgreSQL-backed implementation of the `ResourceStore` port
#[derive(Debug, Clone)]
pub struct PostgresResourceAdapter {
    pool: PgPool,
    lock_timeout_ms: Option<u64>,
}

impl PostgresResourceAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: None,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout_ms: Option<u64>) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }
}

impl DomainPort for PostgresResourceAdapter {}

#[async_trait]
impl HealthCheckable for PostgresResourceAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::probe(&self.pool, "postgres-resource-adapter").await
    }
}

#[async_trait]
impl ResourceStore for PostgresResourceAdapter {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn ResourceTx>, PortError> {
        let tx = begin_with_lock_timeout(&self.pool, self.lock_timeout_ms).await?;
        Ok(Box::new(PostgresResourceTx { tx: Some(tx) }))
    }
}

/// One open resource transaction; dropping it uncommitted rolls back
pub struct PostgresResourceTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresResourceTx {
    fn conn(&mut self) -> Result<&mut PgConnection, PortError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| PortError::internal("resource transaction already committed"))
    }
}

#[async_trait]
impl ResourceTx for PostgresResourceTx {
    async fn insert_resource(&mut self, resource: &Resource) -> Result<(), PortError> {
        Ok(ResourceRepository::insert_resource(self.conn()?, resource).await?)
    }

    async fn find_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError> {
        Ok(ResourceRepository::find_resource(self.conn()?, id, false).await?)
    }

    async fn lock_resource(&mut self, id: ResourceId) -> Result<Option<Resource>, PortError> {
        Ok(ResourceRepository::find_resource(self.conn()?, id, true).await?)
    }

    async fn update_resource(&mut self, resource: &Resource) -> Result<(), PortError> {
        Ok(ResourceRepository::update_resource(self.conn()?, resource).await?)
    }

    async fn active_allocations(&mut self, resource_id: ResourceId) -> Result<Vec<Allocation>, PortError> {
        Ok(ResourceRepository::active_allocations(self.conn()?, resource_id).await?)
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError> {
        Ok(ResourceRepository::insert_allocation(self.conn()?, allocation).await?)
    }

    async fn update_allocation(&mut self, allocation: &Allocation) -> Result<(), PortError> {
        Ok(ResourceRepository::update_allocation(self.conn()?, allocation).await?)
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), PortError> {
        Ok(ResourceRepository::insert_movement(self.conn()?, movement).await?)
    }

    async fn movements(&mut self, resource_id: ResourceId) -> Result<Vec<StockMovement>, PortError> {
        Ok(ResourceRepository::movements(self.conn()?, resource_id).await?)
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| PortError::internal("resource transaction already committed"))?;
        tx.commit().await.map_err(port_error)
    }
}
