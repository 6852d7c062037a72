//! PostgreSQL Ledger Adapter
//!
//! Implements the billing `LedgerStore` port on a PostgreSQL pool. Each
//! `begin` opens a database transaction; `lock_account` and
//! `lock_receivable` issue `SELECT … FOR UPDATE`, so concurrent closures of
//! one account, or concurrent payments against one receivable, queue behind
//! the row lock instead of racing.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use domain_billing::AccountService;
//! use infra_db::adapters::PostgresLedgerAdapter;
//!
//! let adapter = PostgresLedgerAdapter::new(pool);
//! let service = AccountService::new(Arc::new(adapter));
//! ```

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, PatientAccountId, PortError, ReceivableId,
};
use domain_billing::{
    LedgerEntry, LedgerStore, LedgerTx, PatientAccount, Payment, ReceivablePayment, ReceivableQuery,
    ReceivableRecord,
};

use crate::adapters::begin_with_lock_timeout;
use crate::error::port_error;
use crate::repositories::LedgerRepository;

/// PostgreSQL-backed implementation of the `LedgerStore` port
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    pool: PgPool,
    lock_timeout_ms: Option<u64>,
}

impl PostgresLedgerAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: None,
        }
    }

    /// Bounds how long a transaction waits on a row lock before failing
    /// with a transient error
    pub fn with_lock_timeout(mut self, lock_timeout_ms: Option<u64>) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::probe(&self.pool, "postgres-ledger-adapter").await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerAdapter {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PortError> {
        let tx = begin_with_lock_timeout(&self.pool, self.lock_timeout_ms).await?;
        Ok(Box::new(PostgresLedgerTx { tx: Some(tx) }))
    }
}

/// One open ledger transaction; dropping it uncommitted rolls back
pub struct PostgresLedgerTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresLedgerTx {
    fn conn(&mut self) -> Result<&mut PgConnection, PortError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| PortError::internal("ledger transaction already committed"))
    }
}

#[async_trait]
impl LedgerTx for PostgresLedgerTx {
    async fn insert_account(&mut self, account: &PatientAccount) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_account(self.conn()?, account).await?)
    }

    async fn find_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError> {
        Ok(LedgerRepository::find_account(self.conn()?, id, false).await?)
    }

    async fn lock_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError> {
        debug!(account_id = %id, "Locking account row");
        Ok(LedgerRepository::find_account(self.conn()?, id, true).await?)
    }

    async fn update_account(&mut self, account: &PatientAccount) -> Result<(), PortError> {
        Ok(LedgerRepository::update_account(self.conn()?, account).await?)
    }

    async fn entries(&mut self, account_id: PatientAccountId) -> Result<Vec<LedgerEntry>, PortError> {
        Ok(LedgerRepository::entries(self.conn()?, account_id).await?)
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_entry(self.conn()?, entry).await?)
    }

    async fn payments(&mut self, account_id: PatientAccountId) -> Result<Vec<Payment>, PortError> {
        Ok(LedgerRepository::payments(self.conn()?, account_id).await?)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_payment(self.conn()?, payment).await?)
    }

    async fn insert_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_receivable(self.conn()?, receivable).await?)
    }

    async fn find_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError> {
        Ok(LedgerRepository::find_receivable(self.conn()?, id, false).await?)
    }

    async fn lock_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError> {
        debug!(receivable_id = %id, "Locking receivable row");
        Ok(LedgerRepository::find_receivable(self.conn()?, id, true).await?)
    }

    async fn receivable_for_account(
        &mut self,
        account_id: PatientAccountId,
    ) -> Result<Option<ReceivableRecord>, PortError> {
        Ok(LedgerRepository::receivable_for_account(self.conn()?, account_id).await?)
    }

    async fn update_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError> {
        Ok(LedgerRepository::update_receivable(self.conn()?, receivable).await?)
    }

    async fn find_receivables(&mut self, query: &ReceivableQuery) -> Result<Vec<ReceivableRecord>, PortError> {
        Ok(LedgerRepository::find_receivables(self.conn()?, query).await?)
    }

    async fn insert_receivable_payment(&mut self, payment: &ReceivablePayment) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_receivable_payment(self.conn()?, payment).await?)
    }

    async fn receivable_payments(&mut self, receivable_id: ReceivableId) -> Result<Vec<ReceivablePayment>, PortError> {
        Ok(LedgerRepository::receivable_payments(self.conn()?, receivable_id).await?)
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| PortError::internal("ledger transaction already committed"))?;
        tx.commit().await.map_err(port_error)
    }
}
