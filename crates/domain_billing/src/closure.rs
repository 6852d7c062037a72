//! Account closing rules
//!
//! [`plan_closure`] is the pure decision half of closing an account: given
//! the live totals of a locked open account it works out the settlement
//! payment, the frozen snapshot and, when a debt remains, whether a
//! receivable may be authorized. The service persists the plan in the same
//! transaction that holds the account lock.
//!
//! Gates for a remaining debt, checked in order:
//!
//! 1. the caller asked to authorize a receivable, else `UnsettledBalance`
//! 2. the actor holds elevated authority, else `InsufficientAuthority`
//! 3. a non-blank reason was given, else `MissingReason`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Actor, Money};
use crate::account::{PatientAccount, TotalsSnapshot};
use crate::balance::AccountTotals;
use crate::error::BillingError;
use crate::payment::{Payment, PaymentMethod};
use crate::receivable::ReceivableRecord;

/// Caller input for closing an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    /// Settlement received at the desk while closing
    pub amount_paid_now: Option<Decimal>,
    /// Method of the settlement payment
    #[serde(default)]
    pub method: PaymentMethod,
    /// Carry a remaining debt into a receivable
    #[serde(default)]
    pub authorize_receivable: bool,
    /// Justification for the receivable
    pub receivable_reason: Option<String>,
}

impl CloseRequest {
    /// Close with no settlement and no receivable
    pub fn settled() -> Self {
        Self::default()
    }

    pub fn with_payment(mut self, amount: Decimal, method: PaymentMethod) -> Self {
        self.amount_paid_now = Some(amount);
        self.method = method;
        self
    }

    pub fn with_receivable(mut self, reason: impl Into<String>) -> Self {
        self.authorize_receivable = true;
        self.receivable_reason = Some(reason.into());
        self
    }
}

/// Everything the closing transaction must persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosurePlan {
    pub closed_at: DateTime<Utc>,
    pub snapshot: TotalsSnapshot,
    pub settlement: Option<Payment>,
    pub receivable: Option<ReceivableRecord>,
}

/// Decides how `account` closes given its live `totals`
///
/// # Errors
///
/// - `AccountAlreadyClosed` if the account is not open
/// - `InvalidAmount` if `amount_paid_now` is present and not positive
/// - `UnsettledBalance`, `InsufficientAuthority` or `MissingReason` when a
///   debt remains and a receivable gate fails
pub fn plan_closure(
    account: &PatientAccount,
    totals: &AccountTotals,
    request: &CloseRequest,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<ClosurePlan, BillingError> {
    if !account.is_open() {
        return Err(BillingError::AccountAlreadyClosed { account_id: account.id });
    }

    let settlement = match request.amount_paid_now {
        Some(amount) => Some(Payment::settlement(account, amount, request.method, actor)?),
        None => None,
    };
    let paid_now = settlement
        .as_ref()
        .map(|p| p.amount)
        .unwrap_or_else(|| Money::zero(account.currency));

    let pending_after = totals.pending_balance.checked_add(&paid_now)?;

    let receivable = if pending_after.is_negative() {
        if !request.authorize_receivable {
            return Err(BillingError::UnsettledBalance {
                outstanding: pending_after.abs(),
            });
        }
        if !actor.has_elevated_authority() {
            return Err(BillingError::InsufficientAuthority {
                actor: actor.reference().to_string(),
            });
        }
        let reason = request
            .receivable_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(BillingError::MissingReason)?;

        Some(ReceivableRecord::authorize(
            account.id,
            pending_after.abs(),
            actor,
            reason,
            now,
        ))
    } else {
        None
    };

    let snapshot = TotalsSnapshot {
        advance: totals.advance,
        total_services: totals.total_services,
        total_products: totals.total_products,
        total_partial_payments: totals.total_partial_payments,
        amount_paid_at_close: paid_now,
        pending_balance: pending_after,
    };

    Ok(ClosurePlan {
        closed_at: now,
        snapshot,
        settlement,
        receivable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, Role};
    use crate::balance::{live_totals, BalanceOptions};
    use crate::ledger::{EntryKind, LedgerEntry, NewEntry};
    use rust_decimal_macros::dec;

    fn cashier() -> Actor {
        Actor::new("cashier-1", [Role::Cashier])
    }

    fn manager() -> Actor {
        Actor::new("fin-1", [Role::FinanceManager])
    }

    /// Account with 1000 advance and 1800 of services: 800 owed
    fn indebted() -> (PatientAccount, AccountTotals) {
        let account = PatientAccount::open("PAT-1", Currency::MXN, &cashier());
        let entries = vec![
            LedgerEntry::record(&account, NewEntry::advance(dec!(1000)), &cashier()).unwrap(),
            LedgerEntry::record(&account, NewEntry::new(EntryKind::Service, dec!(1), dec!(1800)), &cashier()).unwrap(),
        ];
        let totals = live_totals(&account, &entries, &[], BalanceOptions::default()).unwrap();
        (account, totals)
    }

    #[test]
    fn test_credit_balance_closes_unconditionally() {
        let account = PatientAccount::open("PAT-1", Currency::MXN, &cashier());
        let entries = vec![LedgerEntry::record(&account, NewEntry::advance(dec!(500)), &cashier()).unwrap()];
        let totals = live_totals(&account, &entries, &[], BalanceOptions::default()).unwrap();

        let plan = plan_closure(&account, &totals, &CloseRequest::settled(), &cashier(), Utc::now()).unwrap();
        assert!(plan.receivable.is_none());
        assert!(plan.settlement.is_none());
        assert_eq!(plan.snapshot.pending_balance.amount(), dec!(500));
        assert!(plan.snapshot.amount_paid_at_close.is_zero());
    }

    #[test]
    fn test_receivable_gates_in_order() {
        let (account, totals) = indebted();
        let now = Utc::now();

        let err = plan_closure(&account, &totals, &CloseRequest::settled(), &manager(), now).unwrap_err();
        assert!(matches!(err, BillingError::UnsettledBalance { outstanding } if outstanding.amount() == dec!(800)));

        let err = plan_closure(&account, &totals, &CloseRequest::settled().with_receivable("x"), &cashier(), now).unwrap_err();
        assert!(matches!(err, BillingError::InsufficientAuthority { .. }));

        let err = plan_closure(&account, &totals, &CloseRequest::settled().with_receivable("   "), &manager(), now).unwrap_err();
        assert!(matches!(err, BillingError::MissingReason));

        let plan = plan_closure(&account, &totals, &CloseRequest::settled().with_receivable("insurer pays later"), &manager(), now).unwrap();
        let cpc = plan.receivable.unwrap();
        assert_eq!(cpc.original_amount.amount(), dec!(800));
        assert_eq!(cpc.remaining_amount.amount(), dec!(800));
        assert_eq!(cpc.reason, "insurer pays later");
    }

    #[test]
    fn test_settlement_reduces_debt_before_gates() {
        let (account, totals) = indebted();

        let request = CloseRequest::settled().with_payment(dec!(800), PaymentMethod::Card);
        let plan = plan_closure(&account, &totals, &request, &cashier(), Utc::now()).unwrap();
        assert!(plan.receivable.is_none());
        assert!(plan.snapshot.pending_balance.is_zero());
        assert_eq!(plan.snapshot.amount_paid_at_close.amount(), dec!(800));

        let request = CloseRequest::settled()
            .with_payment(dec!(300), PaymentMethod::Cash)
            .with_receivable("balance on credit");
        let plan = plan_closure(&account, &totals, &request, &manager(), Utc::now()).unwrap();
        assert_eq!(plan.receivable.unwrap().remaining_amount.amount(), dec!(500));
        assert_eq!(plan.snapshot.pending_balance.amount(), dec!(-500));
    }

    #[test]
    fn test_non_positive_settlement_rejected() {
        let (account, totals) = indebted();
        let request = CloseRequest::settled().with_payment(dec!(0), PaymentMethod::Cash);
        let err = plan_closure(&account, &totals, &request, &manager(), Utc::now()).unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount(_)));
    }
}
