//! Billing domain errors

use thiserror::Error;

use core_kernel::{ErrorKind, Money, MoneyError, PatientAccountId, PortError};

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Entry or payment attempted on a closed account
    #[error("Account {account_id} is closed; no further entries or payments are accepted")]
    AccountClosed { account_id: PatientAccountId },

    /// Close attempted on an account that is already closed
    #[error("Account {account_id} is already closed")]
    AccountAlreadyClosed { account_id: PatientAccountId },

    /// Close attempted while a debt remains and no receivable was authorized
    #[error("Outstanding balance of {outstanding} requires payment or receivable authorization")]
    UnsettledBalance { outstanding: Money },

    /// Receivable authorization attempted by an actor without elevated authority
    #[error("Actor '{actor}' is not allowed to authorize a receivable")]
    InsufficientAuthority { actor: String },

    /// Receivable authorization without justification text
    #[error("A reason is required to authorize a receivable")]
    MissingReason,

    /// Receivable payment larger than the remaining balance
    #[error("Payment of {amount} exceeds the remaining receivable balance of {remaining}")]
    ExcessPayment { amount: Money, remaining: Money },

    /// Non-positive or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Arithmetic failure (overflow, currency mismatch)
    #[error("Calculation error: {0}")]
    Calculation(#[from] MoneyError),

    /// Failure reported by the persistence port
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl BillingError {
    /// Creates a not found error for the given entity
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an invalid amount error
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        BillingError::InvalidAmount(message.into())
    }

    /// Returns the stable error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::AccountClosed { .. } => ErrorKind::AccountClosed,
            BillingError::AccountAlreadyClosed { .. } => ErrorKind::AccountAlreadyClosed,
            BillingError::UnsettledBalance { .. } => ErrorKind::UnsettledBalance,
            BillingError::InsufficientAuthority { .. } => ErrorKind::InsufficientAuthority,
            BillingError::MissingReason => ErrorKind::MissingReason,
            BillingError::ExcessPayment { .. } => ErrorKind::ExcessPayment,
            BillingError::InvalidAmount(_) | BillingError::Calculation(_) => ErrorKind::InvalidAmount,
            BillingError::NotFound { .. } => ErrorKind::NotFound,
            BillingError::Store(e) if e.is_transient() => ErrorKind::Transient,
            BillingError::Store(e) if e.is_not_found() => ErrorKind::NotFound,
            BillingError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the failure is infrastructural and the caller may retry
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
