//! Core error types used across the system

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::MoneyError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }
}

/// Stable, machine-readable classification of every failure the core can
/// report to its callers.
///
/// Route handlers map these to HTTP statuses; the string codes are part of
/// the public contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Mutation attempted on a closed account
    AccountClosed,
    /// Duplicate or concurrent close of the same account
    AccountAlreadyClosed,
    /// Close attempted with debt and no receivable authorization
    UnsettledBalance,
    /// Receivable authorization by a non-elevated actor
    InsufficientAuthority,
    /// Receivable authorization without a justification
    MissingReason,
    /// Room or theater already allocated
    ResourceUnavailable,
    /// Stock deduction exceeds available quantity
    InsufficientStock,
    /// Receivable payment exceeds the remaining balance
    ExcessPayment,
    /// Non-positive amount or quantity, or an unusable interval
    InvalidAmount,
    /// Referenced entity does not exist
    NotFound,
    /// Infrastructure failure that may succeed on retry
    Transient,
    /// Infrastructure failure that will not succeed on retry
    Internal,
}

impl ErrorKind {
    /// Returns the stable string code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AccountClosed => "account_closed",
            ErrorKind::AccountAlreadyClosed => "account_already_closed",
            ErrorKind::UnsettledBalance => "unsettled_balance",
            ErrorKind::InsufficientAuthority => "insufficient_authority",
            ErrorKind::MissingReason => "missing_reason",
            ErrorKind::ResourceUnavailable => "resource_unavailable",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::ExcessPayment => "excess_payment",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        }
    }

    /// Returns true for domain (business rule) failures, as opposed to
    /// infrastructure failures
    pub fn is_domain(&self) -> bool {
        !matches!(self, ErrorKind::Transient | ErrorKind::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
