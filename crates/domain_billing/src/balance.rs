//! Balance calculator
//!
//! Account figures are derived along one of two paths, selected by the
//! account state:
//!
//! - **Open** accounts: [`live_totals`] sums ledger entries by kind and the
//!   partial payments received. Nothing stored on the account row is trusted
//!   except the legacy advance field, and only as a fallback.
//! - **Closed** accounts: [`snapshot_totals`] reads the frozen snapshot and
//!   nothing else. Ledger rows written after closing cannot move the figures.
//!
//! All arithmetic runs at full precision; [`AccountTotals::rounded`] is the
//! formatting boundary.

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};
use crate::account::{AccountState, PatientAccount, TotalsSnapshot};
use crate::error::BillingError;
use crate::ledger::{EntryKind, LedgerEntry};
use crate::payment::{Payment, PaymentKind};

/// Where a set of totals came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsSource {
    /// Frozen at closing
    Snapshot,
    /// Derived from ledger rows
    Transactions,
}

/// Options for the live computation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOptions {
    /// Use the account's legacy advance field when no advance entries exist
    pub legacy_advance_fallback: bool,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            legacy_advance_fallback: true,
        }
    }
}

/// Computed figures for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    pub currency: Currency,
    pub advance: Money,
    pub total_services: Money,
    pub total_products: Money,
    pub total_account: Money,
    pub total_partial_payments: Money,
    /// Positive: credit in favour of the patient. Negative: debt.
    pub pending_balance: Money,
    pub source: TotalsSource,
}

impl AccountTotals {
    /// Returns true if the patient owes money
    pub fn has_debt(&self) -> bool {
        self.pending_balance.is_negative()
    }

    /// Returns a copy with every amount rounded to the currency's minor unit
    pub fn rounded(&self) -> Self {
        Self {
            currency: self.currency,
            advance: self.advance.round_to_currency(),
            total_services: self.total_services.round_to_currency(),
            total_products: self.total_products.round_to_currency(),
            total_account: self.total_account.round_to_currency(),
            total_partial_payments: self.total_partial_payments.round_to_currency(),
            pending_balance: self.pending_balance.round_to_currency(),
            source: self.source,
        }
    }
}

/// Computes an account's totals, dispatching on its state
///
/// For closed accounts `entries` and `payments` are ignored.
pub fn compute_totals(
    account: &PatientAccount,
    entries: &[LedgerEntry],
    payments: &[Payment],
    options: BalanceOptions,
) -> Result<AccountTotals, BillingError> {
    match &account.state {
        AccountState::Closed { snapshot, .. } => snapshot_totals(account.currency, snapshot),
        AccountState::Open => live_totals(account, entries, payments, options),
    }
}

/// Totals of a closed account, read from its frozen snapshot
pub fn snapshot_totals(currency: Currency, snapshot: &TotalsSnapshot) -> Result<AccountTotals, BillingError> {
    let total_account = snapshot.total_services.checked_add(&snapshot.total_products)?;

    Ok(AccountTotals {
        currency,
        advance: snapshot.advance,
        total_services: snapshot.total_services,
        total_products: snapshot.total_products,
        total_account,
        total_partial_payments: snapshot.total_partial_payments,
        pending_balance: snapshot.pending_balance,
        source: TotalsSource::Snapshot,
    })
}

/// Totals of an open account, derived from its ledger rows and payments
///
/// pending = (advance + partial payments) - (services + products)
pub fn live_totals(
    account: &PatientAccount,
    entries: &[LedgerEntry],
    payments: &[Payment],
    options: BalanceOptions,
) -> Result<AccountTotals, BillingError> {
    let currency = account.currency;
    let sum_kind = |kind: EntryKind| {
        Money::sum(
            currency,
            entries.iter().filter(|e| e.kind == kind).map(|e| &e.subtotal),
        )
    };

    let total_services = sum_kind(EntryKind::Service)?;
    let total_products = sum_kind(EntryKind::Product)?;

    let has_advance_entries = entries.iter().any(|e| e.kind == EntryKind::Advance);
    let advance = if has_advance_entries || !options.legacy_advance_fallback {
        sum_kind(EntryKind::Advance)?
    } else {
        account.advance_amount
    };

    let total_partial_payments = Money::sum(
        currency,
        payments
            .iter()
            .filter(|p| p.kind == PaymentKind::Partial)
            .map(|p| &p.amount),
    )?;

    let total_account = total_services.checked_add(&total_products)?;
    let pending_balance = advance
        .checked_add(&total_partial_payments)?
        .checked_sub(&total_account)?;

    Ok(AccountTotals {
        currency,
        advance,
        total_services,
        total_products,
        total_account,
        total_partial_payments,
        pending_balance,
        source: TotalsSource::Transactions,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use core_kernel::{Actor, Role};
    use crate::ledger::NewEntry;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        #[test]
        fn pending_equals_advance_plus_payments_minus_charges(
            services in proptest::collection::vec((0i64..50, 0i64..1_000_000), 0..10),
            products in proptest::collection::vec((0i64..50, 0i64..1_000_000), 0..10),
            advance in 0i64..100_000_000,
        ) {
            let actor = Actor::new("prop", [Role::Cashier]);
            let account = PatientAccount::open("PAT-P", Currency::MXN, &actor);
            let mut entries = Vec::new();
            let mut expected_charges = Decimal::ZERO;

            for (qty, cents) in services {
                let price = Decimal::new(cents, 2);
                expected_charges += Decimal::from(qty) * price;
                entries.push(LedgerEntry::record(&account, NewEntry::new(EntryKind::Service, Decimal::from(qty), price), &actor).unwrap());
            }
            for (qty, cents) in products {
                let price = Decimal::new(cents, 2);
                expected_charges += Decimal::from(qty) * price;
                entries.push(LedgerEntry::record(&account, NewEntry::new(EntryKind::Product, Decimal::from(qty), price), &actor).unwrap());
            }
            entries.push(LedgerEntry::record(&account, NewEntry::advance(Decimal::new(advance, 2)), &actor).unwrap());

            let totals = live_totals(&account, &entries, &[], BalanceOptions::default()).unwrap();
            prop_assert_eq!(totals.total_account.amount(), expected_charges);
            prop_assert_eq!(totals.pending_balance.amount(), Decimal::new(advance, 2) - expected_charges);
        }
    }
}
