//! Payments against patient accounts
//!
//! Partial payments are taken while the account is open, independently of
//! advance entries in the ledger. A `Full` payment is the settlement received
//! in the closing transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Actor, Money, PatientAccountId, PaymentId, PortError};
use crate::account::PatientAccount;
use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the cashier's desk
    #[default]
    Cash,
    /// Credit or debit card
    Card,
    /// Bank transfer
    Transfer,
    /// Check/cheque
    Check,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Check => "check",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "check" => Ok(PaymentMethod::Check),
            other => Err(PortError::internal(format!("unknown payment method '{}'", other))),
        }
    }
}

/// Whether a payment was taken during the stay or at closing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Partial,
    Full,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Partial => "partial",
            PaymentKind::Full => "full",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial" => Ok(PaymentKind::Partial),
            "full" => Ok(PaymentKind::Full),
            other => Err(PortError::internal(format!("unknown payment kind '{}'", other))),
        }
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Account being paid
    pub account_id: PatientAccountId,
    /// Payment amount (strictly positive)
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Partial or settlement
    pub kind: PaymentKind,
    /// Cashier who took the payment
    pub actor_ref: String,
    /// When the payment was taken
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a partial payment against an open account
    ///
    /// # Errors
    ///
    /// - `AccountClosed` if the account is not open
    /// - `InvalidAmount` if `amount` is not strictly positive
    pub fn partial(
        account: &PatientAccount,
        amount: Decimal,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<Self, BillingError> {
        Self::build(account, amount, method, PaymentKind::Partial, actor)
    }

    /// Creates the settlement payment taken while closing an account
    pub fn settlement(
        account: &PatientAccount,
        amount: Decimal,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<Self, BillingError> {
        Self::build(account, amount, method, PaymentKind::Full, actor)
    }

    fn build(
        account: &PatientAccount,
        amount: Decimal,
        method: PaymentMethod,
        kind: PaymentKind,
        actor: &Actor,
    ) -> Result<Self, BillingError> {
        account.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(BillingError::invalid_amount(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            account_id: account.id,
            amount: Money::new(amount, account.currency),
            method,
            kind,
            actor_ref: actor.reference().to_string(),
            paid_at: Utc::now(),
        })
    }
}
