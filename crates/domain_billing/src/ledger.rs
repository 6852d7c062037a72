//! Append-only transaction ledger
//!
//! Every charge (service or product) and every advance received on a patient
//! account is one immutable [`LedgerEntry`]. Entries are never updated or
//! deleted; corrections are made by appending offsetting entries.
//!
//! # Invariants
//!
//! - `subtotal == quantity * unit_price`, computed here and never taken from
//!   caller input
//! - quantity and unit price are non-negative
//! - entries are only created against open accounts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Actor, LedgerEntryId, Money, PatientAccountId, PortError};
use crate::account::PatientAccount;
use crate::error::BillingError;

/// Classification of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Service rendered (consultation, procedure, room-day)
    Service,
    /// Product dispensed (medication, supplies)
    Product,
    /// Advance received from the patient
    Advance,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Service => "service",
            EntryKind::Product => "product",
            EntryKind::Advance => "advance",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(EntryKind::Service),
            "product" => Ok(EntryKind::Product),
            "advance" => Ok(EntryKind::Advance),
            other => Err(PortError::internal(format!("unknown entry kind '{}'", other))),
        }
    }
}

/// Caller-supplied data for a new entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Free text shown on the statement
    pub description: Option<String>,
    /// Catalogue reference of the service or product
    pub item_ref: Option<String>,
}

impl NewEntry {
    /// Creates a request with no description or catalogue reference
    pub fn new(kind: EntryKind, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            kind,
            quantity,
            unit_price,
            description: None,
            item_ref: None,
        }
    }

    /// A single advance of `amount`
    pub fn advance(amount: Decimal) -> Self {
        Self::new(EntryKind::Advance, Decimal::ONE, amount)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_item_ref(mut self, item_ref: impl Into<String>) -> Self {
        self.item_ref = Some(item_ref.into());
        self
    }
}

/// One immutable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: PatientAccountId,
    pub kind: EntryKind,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub subtotal: Money,
    pub description: Option<String>,
    pub item_ref: Option<String>,
    pub actor_ref: String,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds a new entry against `account`
    ///
    /// # Errors
    ///
    /// - `AccountClosed` if the account is not open
    /// - `InvalidAmount` if quantity or unit price is negative
    pub fn record(
        account: &PatientAccount,
        request: NewEntry,
        actor: &Actor,
    ) -> Result<Self, BillingError> {
        account.ensure_open()?;

        if request.quantity < Decimal::ZERO {
            return Err(BillingError::invalid_amount(format!(
                "quantity must be non-negative, got {}",
                request.quantity
            )));
        }
        if request.unit_price < Decimal::ZERO {
            return Err(BillingError::invalid_amount(format!(
                "unit price must be non-negative, got {}",
                request.unit_price
            )));
        }

        let unit_price = Money::new(request.unit_price, account.currency);
        let subtotal = unit_price.checked_mul(request.quantity)?;

        Ok(Self {
            id: LedgerEntryId::new_v7(),
            account_id: account.id,
            kind: request.kind,
            quantity: request.quantity,
            unit_price,
            subtotal,
            description: request.description,
            item_ref: request.item_ref,
            actor_ref: actor.reference().to_string(),
            recorded_at: Utc::now(),
        })
    }

    /// Returns true if the stored subtotal matches quantity x unit price
    pub fn is_consistent(&self) -> bool {
        self.unit_price
            .checked_mul(self.quantity)
            .map(|expected| expected == self.subtotal)
            .unwrap_or(false)
    }
}
