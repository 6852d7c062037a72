//! Billing Domain Ports
//!
//! The account service never talks to a database directly. It asks an
//! injected [`LedgerStore`] for a transaction and performs every read that
//! feeds a decision through that [`LedgerTx`] handle.
//!
//! # Transaction contract
//!
//! - `lock_*` methods take an exclusive row lock held until the handle is
//!   committed or dropped (`SELECT … FOR UPDATE` in PostgreSQL)
//! - `find_*` and list methods are plain reads
//! - writes become visible to other transactions only on [`LedgerTx::commit`]
//! - dropping a handle without committing rolls back
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::PgLedgerStore`
//! - **In-memory**: [`mock::InMemoryLedgerStore`], behind the `mock` feature

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, PatientAccountId, PortError, ReceivableId};

use crate::account::PatientAccount;
use crate::ledger::LedgerEntry;
use crate::payment::Payment;
use crate::receivable::{ReceivablePayment, ReceivableQuery, ReceivableRecord};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Source of ledger transactions
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Starts a new transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PortError>;
}

/// One open ledger transaction
#[async_trait]
pub trait LedgerTx: Send {
    // Accounts

    async fn insert_account(&mut self, account: &PatientAccount) -> Result<(), PortError>;

    async fn find_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError>;

    /// Reads the account and locks its row until commit or rollback
    async fn lock_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError>;

    /// Persists the account's state, including a frozen snapshot
    async fn update_account(&mut self, account: &PatientAccount) -> Result<(), PortError>;

    // Ledger rows and payments

    /// Entries of an account in recording order
    async fn entries(&mut self, account_id: PatientAccountId) -> Result<Vec<LedgerEntry>, PortError>;

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), PortError>;

    /// Payments of an account in payment order
    async fn payments(&mut self, account_id: PatientAccountId) -> Result<Vec<Payment>, PortError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    // Receivables

    async fn insert_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError>;

    async fn find_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError>;

    /// Reads the receivable and locks its row until commit or rollback
    async fn lock_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError>;

    async fn receivable_for_account(
        &mut self,
        account_id: PatientAccountId,
    ) -> Result<Option<ReceivableRecord>, PortError>;

    async fn update_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError>;

    /// Receivables matching `query`, oldest first
    async fn find_receivables(&mut self, query: &ReceivableQuery) -> Result<Vec<ReceivableRecord>, PortError>;

    async fn insert_receivable_payment(&mut self, payment: &ReceivablePayment) -> Result<(), PortError>;

    /// Sub-ledger of a receivable in payment order
    async fn receivable_payments(&mut self, receivable_id: ReceivableId) -> Result<Vec<ReceivablePayment>, PortError>;

    /// Makes every write visible and releases the row locks
    async fn commit(&mut self) -> Result<(), PortError>;
}
