//! Receivables (CPC)
//!
//! A receivable carries an authorized debt forward after an account closes.
//! Its remaining amount starts at the original debt and only decreases; each
//! payment against it is recorded in a [`ReceivablePayment`] sub-ledger row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Actor, Money, PatientAccountId, PortError, ReceivableId, ReceivablePaymentId};
use crate::error::BillingError;
use crate::payment::PaymentMethod;

/// Collection state of a receivable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableState {
    Pending,
    PartiallyPaid,
    FullyPaid,
}

impl ReceivableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableState::Pending => "pending",
            ReceivableState::PartiallyPaid => "partially_paid",
            ReceivableState::FullyPaid => "fully_paid",
        }
    }

    /// Returns true while money is still owed
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, ReceivableState::FullyPaid)
    }
}

impl fmt::Display for ReceivableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceivableState {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReceivableState::Pending),
            "partially_paid" => Ok(ReceivableState::PartiallyPaid),
            "fully_paid" => Ok(ReceivableState::FullyPaid),
            other => Err(PortError::internal(format!("unknown receivable state '{}'", other))),
        }
    }
}

/// Debt carried forward from a closed account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableRecord {
    pub id: ReceivableId,
    pub account_id: PatientAccountId,
    /// Debt at closing, as a positive amount
    pub original_amount: Money,
    /// Still owed; `0 <= remaining_amount <= original_amount`
    pub remaining_amount: Money,
    pub state: ReceivableState,
    /// Elevated actor who authorized the receivable
    pub authorized_by: String,
    /// Justification given at authorization
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReceivableRecord {
    /// Creates a pending receivable for `debt` (a positive amount)
    pub fn authorize(
        account_id: PatientAccountId,
        debt: Money,
        authorizer: &Actor,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReceivableId::new_v7(),
            account_id,
            original_amount: debt,
            remaining_amount: debt,
            state: ReceivableState::Pending,
            authorized_by: authorizer.reference().to_string(),
            reason: reason.into(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Applies a payment, returning the sub-ledger row to persist
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not strictly positive
    /// - `ExcessPayment` if `amount` exceeds the remaining balance
    pub fn apply_payment(
        &mut self,
        amount: Decimal,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<ReceivablePayment, BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::invalid_amount(format!(
                "receivable payment must be positive, got {}",
                amount
            )));
        }

        let currency = self.remaining_amount.currency();
        let payment = Money::new(amount, currency);
        if amount > self.remaining_amount.amount() {
            return Err(BillingError::ExcessPayment {
                amount: payment,
                remaining: self.remaining_amount,
            });
        }

        let now = Utc::now();
        self.remaining_amount = self.remaining_amount.checked_sub(&payment)?;
        self.state = if self.remaining_amount.is_zero() {
            ReceivableState::FullyPaid
        } else {
            ReceivableState::PartiallyPaid
        };
        self.updated_at = now;

        Ok(ReceivablePayment {
            id: ReceivablePaymentId::new_v7(),
            receivable_id: self.id,
            amount: payment,
            method,
            actor_ref: actor.reference().to_string(),
            remaining_after: self.remaining_amount,
            paid_at: now,
        })
    }
}

/// One payment in a receivable's sub-ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivablePayment {
    pub id: ReceivablePaymentId,
    pub receivable_id: ReceivableId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub actor_ref: String,
    pub remaining_after: Money,
    pub paid_at: DateTime<Utc>,
}

/// Filters for listing receivables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableQuery {
    /// Restrict to one state; `None` means every outstanding state
    pub state: Option<ReceivableState>,
    pub account_id: Option<PatientAccountId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ReceivableQuery {
    /// Returns true if `record` passes every filter except `limit`
    pub fn matches(&self, record: &ReceivableRecord) -> bool {
        let state_ok = match self.state {
            Some(state) => record.state == state,
            None => record.state.is_outstanding(),
        };
        state_ok
            && self.account_id.map_or(true, |id| record.account_id == id)
            && self.created_from.map_or(true, |from| record.created_at >= from)
            && self.created_to.map_or(true, |to| record.created_at <= to)
    }
}
