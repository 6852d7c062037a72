//! In-memory ledger store
//!
//! Behaves like the PostgreSQL adapter as far as the service can tell:
//! row locks block until the holder commits or drops its transaction,
//! writes stay private to their transaction until commit, and commit
//! enforces the same keys and constraints as the schema.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, PatientAccountId, PortError,
    ReceivableId,
};

use super::{LedgerStore, LedgerTx};
use crate::account::PatientAccount;
use crate::ledger::LedgerEntry;
use crate::payment::Payment;
use crate::receivable::{ReceivablePayment, ReceivableQuery, ReceivableRecord};

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<PatientAccountId, PatientAccount>,
    entries: Vec<LedgerEntry>,
    payments: Vec<Payment>,
    receivables: HashMap<ReceivableId, ReceivableRecord>,
    receivable_payments: Vec<ReceivablePayment>,
}

#[derive(Debug, Clone)]
enum Write {
    InsertAccount(PatientAccount),
    UpdateAccount(PatientAccount),
    Entry(LedgerEntry),
    Payment(Payment),
    InsertReceivable(ReceivableRecord),
    UpdateReceivable(ReceivableRecord),
    ReceivablePayment(ReceivablePayment),
}

impl Tables {
    /// Applies a write, enforcing the schema's keys and constraints
    fn apply(&mut self, write: Write) -> Result<(), PortError> {
        match write {
            Write::InsertAccount(account) => {
                if self.accounts.contains_key(&account.id) {
                    return Err(PortError::conflict(format!("account {} already exists", account.id)));
                }
                self.accounts.insert(account.id, account);
            }
            Write::UpdateAccount(account) => {
                if !self.accounts.contains_key(&account.id) {
                    return Err(PortError::not_found("PatientAccount", account.id));
                }
                self.accounts.insert(account.id, account);
            }
            Write::Entry(entry) => {
                self.require_account(entry.account_id)?;
                self.entries.push(entry);
            }
            Write::Payment(payment) => {
                self.require_account(payment.account_id)?;
                self.payments.push(payment);
            }
            Write::InsertReceivable(receivable) => {
                self.require_account(receivable.account_id)?;
                if self.receivables.values().any(|r| r.account_id == receivable.account_id) {
                    return Err(PortError::conflict(format!(
                        "account {} already has a receivable",
                        receivable.account_id
                    )));
                }
                self.receivables.insert(receivable.id, receivable);
            }
            Write::UpdateReceivable(receivable) => {
                if !self.receivables.contains_key(&receivable.id) {
                    return Err(PortError::not_found("Receivable", receivable.id));
                }
                if receivable.remaining_amount.is_negative()
                    || receivable.remaining_amount.amount() > receivable.original_amount.amount()
                {
                    return Err(PortError::conflict("receivable remaining amount out of range"));
                }
                self.receivables.insert(receivable.id, receivable);
            }
            Write::ReceivablePayment(payment) => {
                if !self.receivables.contains_key(&payment.receivable_id) {
                    return Err(PortError::conflict(format!(
                        "receivable {} does not exist",
                        payment.receivable_id
                    )));
                }
                self.receivable_payments.push(payment);
            }
        }
        Ok(())
    }

    fn require_account(&self, id: PatientAccountId) -> Result<(), PortError> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(PortError::conflict(format!("account {} does not exist", id)))
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    unavailable: AtomicBool,
}

/// In-memory [`LedgerStore`] for tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `begin` fail with a connection error, as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Writes a ledger row directly, bypassing the service's open-account check
    pub async fn insert_entry_unchecked(&self, entry: LedgerEntry) -> Result<(), PortError> {
        self.shared.tables.lock().await.apply(Write::Entry(entry))
    }

    /// Writes a payment row directly, bypassing the service's open-account check
    pub async fn insert_payment_unchecked(&self, payment: Payment) -> Result<(), PortError> {
        self.shared.tables.lock().await.apply(Write::Payment(payment))
    }

    /// Number of committed receivables for `account_id`
    pub async fn receivable_count(&self, account_id: PatientAccountId) -> usize {
        self.shared
            .tables
            .lock()
            .await
            .receivables
            .values()
            .filter(|r| r.account_id == account_id)
            .count()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            HealthCheckResult::unhealthy("in-memory-ledger", 0, "store marked unavailable")
        } else {
            HealthCheckResult::healthy("in-memory-ledger", 0)
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PortError> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::connection("in-memory ledger store is unavailable"));
        }
        Ok(Box::new(InMemoryLedgerTx {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            pending: Vec::new(),
        }))
    }
}

/// Transaction over [`InMemoryLedgerStore`]
///
/// Held row guards are released when the transaction is committed or dropped.
struct InMemoryLedgerTx {
    shared: Arc<Shared>,
    held: HashMap<Uuid, OwnedMutexGuard<()>>,
    pending: Vec<Write>,
}

impl InMemoryLedgerTx {
    async fn lock_row(&mut self, key: Uuid) {
        if self.held.contains_key(&key) {
            return;
        }
        let row = {
            let mut locks = self.shared.row_locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = row.lock_owned().await;
        self.held.insert(key, guard);
    }

    /// Committed tables with this transaction's pending writes applied
    async fn view(&self) -> Tables {
        tokio::task::yield_now().await;
        let mut view = self.shared.tables.lock().await.clone();
        for write in &self.pending {
            // pending writes were validated against this view when staged
            let _ = view.apply(write.clone());
        }
        view
    }

    async fn stage(&mut self, write: Write) -> Result<(), PortError> {
        let mut view = self.view().await;
        view.apply(write.clone())?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn insert_account(&mut self, account: &PatientAccount) -> Result<(), PortError> {
        self.stage(Write::InsertAccount(account.clone())).await
    }

    async fn find_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError> {
        Ok(self.view().await.accounts.get(&id).cloned())
    }

    async fn lock_account(&mut self, id: PatientAccountId) -> Result<Option<PatientAccount>, PortError> {
        self.lock_row(*id.as_uuid()).await;
        self.find_account(id).await
    }

    async fn update_account(&mut self, account: &PatientAccount) -> Result<(), PortError> {
        self.stage(Write::UpdateAccount(account.clone())).await
    }

    async fn entries(&mut self, account_id: PatientAccountId) -> Result<Vec<LedgerEntry>, PortError> {
        let view = self.view().await;
        Ok(view.entries.into_iter().filter(|e| e.account_id == account_id).collect())
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), PortError> {
        self.stage(Write::Entry(entry.clone())).await
    }

    async fn payments(&mut self, account_id: PatientAccountId) -> Result<Vec<Payment>, PortError> {
        let view = self.view().await;
        Ok(view.payments.into_iter().filter(|p| p.account_id == account_id).collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        self.stage(Write::Payment(payment.clone())).await
    }

    async fn insert_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError> {
        self.stage(Write::InsertReceivable(receivable.clone())).await
    }

    async fn find_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError> {
        Ok(self.view().await.receivables.get(&id).cloned())
    }

    async fn lock_receivable(&mut self, id: ReceivableId) -> Result<Option<ReceivableRecord>, PortError> {
        self.lock_row(*id.as_uuid()).await;
        self.find_receivable(id).await
    }

    async fn receivable_for_account(
        &mut self,
        account_id: PatientAccountId,
    ) -> Result<Option<ReceivableRecord>, PortError> {
        let view = self.view().await;
        Ok(view.receivables.into_values().find(|r| r.account_id == account_id))
    }

    async fn update_receivable(&mut self, receivable: &ReceivableRecord) -> Result<(), PortError> {
        self.stage(Write::UpdateReceivable(receivable.clone())).await
    }

    async fn find_receivables(&mut self, query: &ReceivableQuery) -> Result<Vec<ReceivableRecord>, PortError> {
        let view = self.view().await;
        let mut found: Vec<_> = view
            .receivables
            .into_values()
            .filter(|r| query.matches(r))
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn insert_receivable_payment(&mut self, payment: &ReceivablePayment) -> Result<(), PortError> {
        self.stage(Write::ReceivablePayment(payment.clone())).await
    }

    async fn receivable_payments(&mut self, receivable_id: ReceivableId) -> Result<Vec<ReceivablePayment>, PortError> {
        let view = self.view().await;
        Ok(view
            .receivable_payments
            .into_iter()
            .filter(|p| p.receivable_id == receivable_id)
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

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Actor, Currency, Role};
    use std::time::Duration;

    fn account() -> PatientAccount {
        PatientAccount::open("PAT-1", Currency::MXN, &Actor::new("r", [Role::Receptionist]))
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = InMemoryLedgerStore::new();
        let account = account();

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();
        assert!(tx.find_account(account.id).await.unwrap().is_some());

        let mut other = store.begin().await.unwrap();
        assert!(other.find_account(account.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(other.find_account(account.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemoryLedgerStore::new();
        let account = account();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(&account).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_account(account.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_row_lock_blocks_second_locker() {
        let store = InMemoryLedgerStore::new();
        let account = account();
        let mut setup = store.begin().await.unwrap();
        setup.insert_account(&account).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_account(account.id).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                second.lock_account(account.id).await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released on drop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_transiently() {
        let store = InMemoryLedgerStore::new();
        store.set_unavailable(true);
        let err = store.begin().await.err().unwrap();
        assert!(err.is_transient());
        assert!(!store.health_check().await.is_healthy());
    }
}
