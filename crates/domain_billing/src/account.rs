//! Patient account and its lifecycle
//!
//! An account is `Open` while care is being delivered and charges accrue,
//! and becomes `Closed` exactly once, at discharge. Closing freezes a
//! [`TotalsSnapshot`] inside the `Closed` variant; from then on the snapshot
//! is the only source of truth for the account's figures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Actor, Currency, Money, PatientAccountId, PortError};
use crate::error::BillingError;

/// Persisted status discriminant of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Open,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Open => "open",
            AccountStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AccountStatus::Open),
            "closed" => Ok(AccountStatus::Closed),
            other => Err(PortError::internal(format!("unknown account status '{}'", other))),
        }
    }
}

/// Totals frozen onto an account when it is closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsSnapshot {
    /// Effective advance at closing
    pub advance: Money,
    /// Sum of service charges
    pub total_services: Money,
    /// Sum of product charges
    pub total_products: Money,
    /// Sum of partial payments received while open
    pub total_partial_payments: Money,
    /// Settlement received in the closing transaction (zero if none)
    pub amount_paid_at_close: Money,
    /// Balance after settlement; negative means debt carried to a receivable
    pub pending_balance: Money,
}

/// Lifecycle state of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccountState {
    /// Charges and payments are accepted; totals are derived live
    Open,
    /// Terminal; totals come solely from the snapshot
    Closed {
        closed_at: DateTime<Utc>,
        snapshot: TotalsSnapshot,
    },
}

/// A patient's account for one episode of care
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientAccount {
    /// Unique identifier
    pub id: PatientAccountId,
    /// Reference to the patient record
    pub patient_ref: String,
    /// Account currency; every entry and payment uses it
    pub currency: Currency,
    /// Legacy advance field, used only when no advance entries exist
    pub advance_amount: Money,
    /// Lifecycle state
    pub state: AccountState,
    /// When the account was opened
    pub opened_at: DateTime<Utc>,
    /// Actor who opened the account
    pub opened_by: String,
}

impl PatientAccount {
    /// Opens a new account with a zero advance
    pub fn open(patient_ref: impl Into<String>, currency: Currency, actor: &Actor) -> Self {
        Self {
            id: PatientAccountId::new_v7(),
            patient_ref: patient_ref.into(),
            currency,
            advance_amount: Money::zero(currency),
            state: AccountState::Open,
            opened_at: Utc::now(),
            opened_by: actor.reference().to_string(),
        }
    }

    /// Returns the status discriminant
    pub fn status(&self) -> AccountStatus {
        match self.state {
            AccountState::Open => AccountStatus::Open,
            AccountState::Closed { .. } => AccountStatus::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, AccountState::Open)
    }

    /// Returns the closing timestamp, if closed
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            AccountState::Open => None,
            AccountState::Closed { closed_at, .. } => Some(*closed_at),
        }
    }

    /// Returns the frozen snapshot, if closed
    pub fn snapshot(&self) -> Option<&TotalsSnapshot> {
        match &self.state {
            AccountState::Open => None,
            AccountState::Closed { snapshot, .. } => Some(snapshot),
        }
    }

    /// Fails with `AccountClosed` unless the account accepts mutations
    pub fn ensure_open(&self) -> Result<(), BillingError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BillingError::AccountClosed { account_id: self.id })
        }
    }

    /// Transitions open -> closed, freezing `snapshot`
    ///
    /// # Errors
    ///
    /// `AccountAlreadyClosed` if the account is not open.
    pub fn close(&mut self, snapshot: TotalsSnapshot, closed_at: DateTime<Utc>) -> Result<(), BillingError> {
        if !self.is_open() {
            return Err(BillingError::AccountAlreadyClosed { account_id: self.id });
        }
        self.state = AccountState::Closed { closed_at, snapshot };
        Ok(())
    }
}
