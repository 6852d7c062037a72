//! Account service
//!
//! Runs each ledger operation as one store transaction. Operations that
//! check state and then act on it (entries, payments, closing, receivable
//! payments) lock the row they depend on first, so concurrent requests
//! against the same account or receivable serialize.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use core_kernel::{Actor, Currency, PatientAccountId, ReceivableId};

use crate::account::PatientAccount;
use crate::balance::{compute_totals, live_totals, AccountTotals, BalanceOptions};
use crate::closure::{plan_closure, CloseRequest};
use crate::error::BillingError;
use crate::ledger::{LedgerEntry, NewEntry};
use crate::payment::{Payment, PaymentMethod};
use crate::ports::{LedgerStore, LedgerTx};
use crate::receivable::{ReceivablePayment, ReceivableQuery, ReceivableRecord};

/// Read view of one account
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatement {
    pub account: PatientAccount,
    pub entries: Vec<LedgerEntry>,
    pub payments: Vec<Payment>,
    pub totals: AccountTotals,
    pub receivable: Option<ReceivableRecord>,
}

/// Result of a successful close
#[derive(Debug, Clone, Serialize)]
pub struct ClosureOutcome {
    pub account: PatientAccount,
    pub totals: AccountTotals,
    pub settlement: Option<Payment>,
    pub receivable: Option<ReceivableRecord>,
}

/// Application service for patient accounts and receivables
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    options: BalanceOptions,
}

impl AccountService {
    /// Creates a service with default balance options
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            options: BalanceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BalanceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> BalanceOptions {
        self.options
    }

    /// Opens a new account with a zero advance
    #[instrument(skip(self, actor), fields(actor = %actor.reference()))]
    pub async fn open_account(
        &self,
        patient_ref: &str,
        currency: Currency,
        actor: &Actor,
    ) -> Result<PatientAccount, BillingError> {
        let account = PatientAccount::open(patient_ref, currency, actor);

        let mut tx = self.store.begin().await?;
        tx.insert_account(&account).await?;
        tx.commit().await?;

        info!(account_id = %account.id, "Account opened");
        Ok(account)
    }

    /// Appends a charge or advance to an open account
    #[instrument(skip(self, request, actor), fields(actor = %actor.reference(), kind = %request.kind))]
    pub async fn append_entry(
        &self,
        account_id: PatientAccountId,
        request: NewEntry,
        actor: &Actor,
    ) -> Result<LedgerEntry, BillingError> {
        let mut tx = self.store.begin().await?;
        let account = Self::locked_account(tx.as_mut(), account_id).await?;

        let entry = LedgerEntry::record(&account, request, actor).map_err(|e| {
            warn!(error = %e, "Entry rejected");
            e
        })?;
        tx.insert_entry(&entry).await?;
        tx.commit().await?;

        debug!(entry_id = %entry.id, "Entry recorded");
        Ok(entry)
    }

    /// Takes a partial payment against an open account
    #[instrument(skip(self, amount, actor), fields(actor = %actor.reference()))]
    pub async fn record_partial_payment(
        &self,
        account_id: PatientAccountId,
        amount: Decimal,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.store.begin().await?;
        let account = Self::locked_account(tx.as_mut(), account_id).await?;

        let payment = Payment::partial(&account, amount, method, actor).map_err(|e| {
            warn!(error = %e, "Partial payment rejected");
            e
        })?;
        tx.insert_payment(&payment).await?;
        tx.commit().await?;

        info!(payment_id = %payment.id, "Partial payment recorded");
        Ok(payment)
    }

    /// Current totals of an account, at full precision
    ///
    /// Closed accounts are answered from their snapshot without reading
    /// ledger rows.
    #[instrument(skip(self))]
    pub async fn compute_totals(&self, account_id: PatientAccountId) -> Result<AccountTotals, BillingError> {
        let mut tx = self.store.begin().await?;
        let account = Self::existing_account(tx.as_mut(), account_id).await?;

        if !account.is_open() {
            return compute_totals(&account, &[], &[], self.options);
        }

        let entries = tx.entries(account_id).await?;
        let payments = tx.payments(account_id).await?;
        compute_totals(&account, &entries, &payments, self.options)
    }

    /// Account, rows, totals and any receivable in one read
    #[instrument(skip(self))]
    pub async fn statement(&self, account_id: PatientAccountId) -> Result<AccountStatement, BillingError> {
        let mut tx = self.store.begin().await?;
        let account = Self::existing_account(tx.as_mut(), account_id).await?;
        let entries = tx.entries(account_id).await?;
        let payments = tx.payments(account_id).await?;
        let receivable = tx.receivable_for_account(account_id).await?;
        let totals = compute_totals(&account, &entries, &payments, self.options)?;

        Ok(AccountStatement {
            account,
            entries,
            payments,
            totals,
            receivable,
        })
    }

    /// Closes an account, freezing its totals
    ///
    /// The settlement payment, the receivable and the state change commit
    /// together or not at all. Of two concurrent closes exactly one succeeds;
    /// the other fails with `AccountAlreadyClosed`.
    #[instrument(
        skip(self, request, actor),
        fields(actor = %actor.reference(), authorize_receivable = request.authorize_receivable)
    )]
    pub async fn close(
        &self,
        account_id: PatientAccountId,
        request: CloseRequest,
        actor: &Actor,
    ) -> Result<ClosureOutcome, BillingError> {
        let mut tx = self.store.begin().await?;
        let mut account = tx
            .lock_account(account_id)
            .await?
            .ok_or_else(|| BillingError::not_found("PatientAccount", account_id))?;

        if !account.is_open() {
            warn!("Close rejected: account already closed");
            return Err(BillingError::AccountAlreadyClosed { account_id });
        }

        let entries = tx.entries(account_id).await?;
        let payments = tx.payments(account_id).await?;
        let totals = live_totals(&account, &entries, &payments, self.options)?;

        let plan = plan_closure(&account, &totals, &request, actor, Utc::now()).map_err(|e| {
            warn!(error = %e, kind = %e.kind(), "Close rejected");
            e
        })?;

        if let Some(settlement) = &plan.settlement {
            tx.insert_payment(settlement).await?;
        }
        if let Some(receivable) = &plan.receivable {
            tx.insert_receivable(receivable).await?;
        }
        account.close(plan.snapshot.clone(), plan.closed_at)?;
        tx.update_account(&account).await?;
        tx.commit().await?;

        let totals = compute_totals(&account, &[], &[], self.options)?;
        info!(pending_balance = %totals.pending_balance, "Account closed");
        if let Some(receivable) = &plan.receivable {
            info!(
                receivable_id = %receivable.id,
                authorized_by = %receivable.authorized_by,
                amount = %receivable.original_amount,
                "Receivable authorized"
            );
        }

        Ok(ClosureOutcome {
            account,
            totals,
            settlement: plan.settlement,
            receivable: plan.receivable,
        })
    }

    /// Applies a payment to a receivable
    #[instrument(skip(self, amount, actor), fields(actor = %actor.reference()))]
    pub async fn record_receivable_payment(
        &self,
        receivable_id: ReceivableId,
        amount: Decimal,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<ReceivableRecord, BillingError> {
        let mut tx = self.store.begin().await?;
        let mut receivable = tx
            .lock_receivable(receivable_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Receivable", receivable_id))?;

        let payment = receivable.apply_payment(amount, method, actor).map_err(|e| {
            warn!(error = %e, "Receivable payment rejected");
            e
        })?;
        tx.update_receivable(&receivable).await?;
        tx.insert_receivable_payment(&payment).await?;
        tx.commit().await?;

        info!(
            remaining = %receivable.remaining_amount,
            state = %receivable.state,
            "Receivable payment recorded"
        );
        Ok(receivable)
    }

    /// Receivables matching `query`, oldest first
    #[instrument(skip(self))]
    pub async fn list_outstanding(&self, query: &ReceivableQuery) -> Result<Vec<ReceivableRecord>, BillingError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_receivables(query).await?)
    }

    /// Payment sub-ledger of a receivable
    #[instrument(skip(self))]
    pub async fn receivable_payments(&self, receivable_id: ReceivableId) -> Result<Vec<ReceivablePayment>, BillingError> {
        let mut tx = self.store.begin().await?;
        if tx.find_receivable(receivable_id).await?.is_none() {
            return Err(BillingError::not_found("Receivable", receivable_id));
        }
        Ok(tx.receivable_payments(receivable_id).await?)
    }

    async fn existing_account(
        tx: &mut dyn LedgerTx,
        account_id: PatientAccountId,
    ) -> Result<PatientAccount, BillingError> {
        tx.find_account(account_id)
            .await?
            .ok_or_else(|| BillingError::not_found("PatientAccount", account_id))
    }

    /// Locks the account row; the account must exist and be open
    async fn locked_account(
        tx: &mut dyn LedgerTx,
        account_id: PatientAccountId,
    ) -> Result<PatientAccount, BillingError> {
        let account = tx
            .lock_account(account_id)
            .await?
            .ok_or_else(|| BillingError::not_found("PatientAccount", account_id))?;
        if let Err(e) = account.ensure_open() {
            warn!(account_id = %account_id, "Mutation rejected: account closed");
            return Err(e);
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EntryKind;
    use crate::ports::mock::InMemoryLedgerStore;
    use crate::receivable::ReceivableState;
    use core_kernel::{ErrorKind, Money, Role};
    use rust_decimal_macros::dec;

    fn cashier() -> Actor {
        Actor::new("cashier-1", [Role::Cashier])
    }

    fn manager() -> Actor {
        Actor::new("fin-1", [Role::FinanceManager])
    }

    fn service() -> (InMemoryLedgerStore, AccountService) {
        let store = InMemoryLedgerStore::new();
        let service = AccountService::new(Arc::new(store.clone()));
        (store, service)
    }

    /// Open account with 10000 advance, 3000 services, 2000 products
    async fn funded_account(service: &AccountService) -> PatientAccount {
        let account = service.open_account("PAT-100", Currency::MXN, &cashier()).await.unwrap();
        service.append_entry(account.id, NewEntry::advance(dec!(10000)), &cashier()).await.unwrap();
        service
            .append_entry(account.id, NewEntry::new(EntryKind::Service, dec!(2), dec!(1500)), &cashier())
            .await
            .unwrap();
        service
            .append_entry(account.id, NewEntry::new(EntryKind::Product, dec!(4), dec!(500)), &cashier())
            .await
            .unwrap();
        account
    }

    /// Open account owing 800
    async fn indebted_account(service: &AccountService) -> PatientAccount {
        let account = service.open_account("PAT-200", Currency::MXN, &cashier()).await.unwrap();
        service.append_entry(account.id, NewEntry::advance(dec!(1000)), &cashier()).await.unwrap();
        service
            .append_entry(account.id, NewEntry::new(EntryKind::Service, dec!(1), dec!(1800)), &cashier())
            .await
            .unwrap();
        account
    }

    #[tokio::test]
    async fn test_open_account_balance() {
        let (_, service) = service();
        let account = funded_account(&service).await;

        let totals = service.compute_totals(account.id).await.unwrap();
        assert_eq!(totals.total_account.amount(), dec!(5000));
        assert_eq!(totals.pending_balance.amount(), dec!(5000));
        assert_eq!(totals.source, crate::balance::TotalsSource::Transactions);
    }

    #[tokio::test]
    async fn test_snapshot_immutable_after_close() {
        let (store, service) = service();
        let account = funded_account(&service).await;

        let outcome = service.close(account.id, CloseRequest::settled(), &cashier()).await.unwrap();
        assert!(!outcome.account.is_open());
        let frozen = service.compute_totals(account.id).await.unwrap();
        assert_eq!(frozen, outcome.totals);
        assert_eq!(frozen.source, crate::balance::TotalsSource::Snapshot);

        // rows written behind the service's back, built from the stale open copy
        let late = LedgerEntry::record(&account, NewEntry::new(EntryKind::Service, dec!(1), dec!(999)), &cashier()).unwrap();
        store.insert_entry_unchecked(late).await.unwrap();
        let late_payment = Payment::partial(&account, dec!(50), PaymentMethod::Cash, &cashier()).unwrap();
        store.insert_payment_unchecked(late_payment).await.unwrap();

        let after = service.compute_totals(account.id).await.unwrap();
        assert_eq!(after, frozen);
        assert_eq!(after.pending_balance.amount(), dec!(5000));
        assert_eq!(after.total_account.amount(), dec!(5000));
    }

    #[tokio::test]
    async fn test_mutations_rejected_on_closed_account() {
        let (_, service) = service();
        let account = funded_account(&service).await;
        service.close(account.id, CloseRequest::settled(), &cashier()).await.unwrap();

        let entry = service
            .append_entry(account.id, NewEntry::new(EntryKind::Service, dec!(1), dec!(10)), &cashier())
            .await;
        assert!(matches!(entry, Err(BillingError::AccountClosed { .. })));

        let payment = service
            .record_partial_payment(account.id, dec!(10), PaymentMethod::Cash, &cashier())
            .await;
        assert!(matches!(payment, Err(BillingError::AccountClosed { .. })));
    }

    #[tokio::test]
    async fn test_double_close_fails() {
        let (_, service) = service();
        let account = funded_account(&service).await;

        service.close(account.id, CloseRequest::settled(), &cashier()).await.unwrap();
        let second = service.close(account.id, CloseRequest::settled(), &cashier()).await;
        assert!(matches!(second, Err(BillingError::AccountAlreadyClosed { .. })));
    }

    #[tokio::test]
    async fn test_receivable_gate_leaves_account_open() {
        let (store, service) = service();
        let account = indebted_account(&service).await;

        let err = service.close(account.id, CloseRequest::settled(), &manager()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsettledBalance);

        let err = service
            .close(account.id, CloseRequest::settled().with_receivable("promise to pay"), &cashier())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientAuthority);

        let err = service
            .close(account.id, CloseRequest::settled().with_receivable(""), &manager())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingReason);

        let statement = service.statement(account.id).await.unwrap();
        assert!(statement.account.is_open());
        assert!(statement.receivable.is_none());
        assert_eq!(store.receivable_count(account.id).await, 0);

        let outcome = service
            .close(account.id, CloseRequest::settled().with_receivable("promise to pay"), &manager())
            .await
            .unwrap();
        let receivable = outcome.receivable.unwrap();
        assert_eq!(receivable.remaining_amount.amount(), dec!(800));
        assert_eq!(receivable.state, ReceivableState::Pending);
        assert_eq!(outcome.totals.pending_balance.amount(), dec!(-800));
    }

    #[tokio::test]
    async fn test_settlement_persisted_with_close() {
        let (_, service) = service();
        let account = indebted_account(&service).await;

        let outcome = service
            .close(
                account.id,
                CloseRequest::settled().with_payment(dec!(800), PaymentMethod::Card),
                &cashier(),
            )
            .await
            .unwrap();
        assert!(outcome.receivable.is_none());
        assert!(outcome.totals.pending_balance.is_zero());

        let statement = service.statement(account.id).await.unwrap();
        assert_eq!(statement.payments.len(), 1);
        assert_eq!(statement.payments[0].kind, crate::payment::PaymentKind::Full);
        let snapshot = statement.account.snapshot().unwrap();
        assert_eq!(snapshot.amount_paid_at_close.amount(), dec!(800));
    }

    #[tokio::test]
    async fn test_receivable_payoff() {
        let (_, service) = service();
        let account = indebted_account(&service).await;
        let outcome = service
            .close(account.id, CloseRequest::settled().with_receivable("credit approved"), &manager())
            .await
            .unwrap();
        let id = outcome.receivable.unwrap().id;

        let after_first = service
            .record_receivable_payment(id, dec!(300), PaymentMethod::Cash, &cashier())
            .await
            .unwrap();
        assert_eq!(after_first.state, ReceivableState::PartiallyPaid);
        assert_eq!(after_first.remaining_amount.amount(), dec!(500));

        let excess = service
            .record_receivable_payment(id, dec!(600), PaymentMethod::Cash, &cashier())
            .await
            .unwrap_err();
        assert_eq!(excess.kind(), ErrorKind::ExcessPayment);

        let paid = service
            .record_receivable_payment(id, dec!(500), PaymentMethod::Transfer, &cashier())
            .await
            .unwrap();
        assert_eq!(paid.state, ReceivableState::FullyPaid);
        assert!(paid.remaining_amount.is_zero());

        let history = service.receivable_payments(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].remaining_after, Money::zero(Currency::MXN));

        assert!(service.list_outstanding(&ReceivableQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_outstanding_filters() {
        let (_, service) = service();
        let first = indebted_account(&service).await;
        let second = indebted_account(&service).await;
        for account in [&first, &second] {
            service
                .close(account.id, CloseRequest::settled().with_receivable("credit"), &manager())
                .await
                .unwrap();
        }

        let all = service.list_outstanding(&ReceivableQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].account_id, first.id);

        let limited = ReceivableQuery {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(service.list_outstanding(&limited).await.unwrap().len(), 1);

        let by_account = ReceivableQuery {
            account_id: Some(second.id),
            ..Default::default()
        };
        let found = service.list_outstanding(&by_account).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].account_id, second.id);
    }

    #[tokio::test]
    async fn test_legacy_advance_switch() {
        let (store, service) = service();
        let mut account = service.open_account("PAT-300", Currency::MXN, &cashier()).await.unwrap();
        account.advance_amount = Money::new(dec!(400), Currency::MXN);
        {
            let mut tx = store.begin().await.unwrap();
            tx.update_account(&account).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(service.compute_totals(account.id).await.unwrap().advance.amount(), dec!(400));

        let strict = service.clone().with_options(BalanceOptions { legacy_advance_fallback: false });
        assert!(strict.compute_totals(account.id).await.unwrap().advance.is_zero());

        service.append_entry(account.id, NewEntry::advance(dec!(25)), &cashier()).await.unwrap();
        assert_eq!(service.compute_totals(account.id).await.unwrap().advance.amount(), dec!(25));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (_, service) = service();
        let err = service.compute_totals(PatientAccountId::new_v7()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_store_outage_is_transient() {
        let (store, service) = service();
        store.set_unavailable(true);
        let err = service.open_account("PAT-1", Currency::MXN, &cashier()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_closes_serialize() {
        let (store, service) = service();
        let account = indebted_account(&service).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .close(account.id, CloseRequest::settled().with_receivable("credit"), &manager())
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::AccountAlreadyClosed),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(store.receivable_count(account.id).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_entries_racing_close_never_land_after_snapshot() {
        let (_, service) = service();
        let account = funded_account(&service).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .append_entry(account.id, NewEntry::new(EntryKind::Product, dec!(1), dec!(10)), &cashier())
                    .await
                    .is_ok()
            }));
        }
        let closer = {
            let service = service.clone();
            tokio::spawn(async move { service.close(account.id, CloseRequest::settled(), &cashier()).await })
        };

        let mut appended = 0;
        for handle in handles {
            if handle.await.unwrap() {
                appended += 1;
            }
        }
        let outcome = closer.await.unwrap().unwrap();

        // every accepted entry landed before the close locked the account
        let statement = service.statement(account.id).await.unwrap();
        assert_eq!(statement.entries.len(), 3 + appended);
        assert_eq!(
            outcome.totals.total_products.amount(),
            dec!(2000) + Decimal::from(appended as u64) * dec!(10)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_receivable_payments_never_overpay() {
        let (_, service) = service();
        let account = indebted_account(&service).await;
        let id = service
            .close(account.id, CloseRequest::settled().with_receivable("credit"), &manager())
            .await
            .unwrap()
            .receivable
            .unwrap()
            .id;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .record_receivable_payment(id, dec!(300), PaymentMethod::Cash, &cashier())
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::ExcessPayment),
            }
        }
        assert_eq!(accepted, 2);

        let remaining = service.list_outstanding(&ReceivableQuery::default()).await.unwrap();
        assert_eq!(remaining[0].remaining_amount.amount(), dec!(200));
        assert_eq!(service.receivable_payments(id).await.unwrap().len(), 2);
    }
}
