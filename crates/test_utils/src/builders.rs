//! Test Data Builders
//!
//! `LedgerScenarioBuilder` assembles an open account with its entries and
//! payments through the domain constructors, so scenarios always satisfy the
//! same invariants the service enforces. Use it to feed the pure balance and
//! closure functions without a store.

use rust_decimal::Decimal;

use core_kernel::{Actor, Currency, Money};
use domain_billing::{BillingError, EntryKind, LedgerEntry, NewEntry, PatientAccount, Payment, PaymentMethod};

use crate::fixtures::{ActorFixtures, LedgerFixtures};

/// An account with the rows recorded against it
#[derive(Debug, Clone)]
pub struct LedgerScenario {
    pub account: PatientAccount,
    pub entries: Vec<LedgerEntry>,
    pub payments: Vec<Payment>,
}

/// Builder for ledger scenarios
pub struct LedgerScenarioBuilder {
    currency: Currency,
    legacy_advance: Option<Decimal>,
    entries: Vec<NewEntry>,
    partial_payments: Vec<Decimal>,
    actor: Actor,
}

impl Default for LedgerScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerScenarioBuilder {
    /// Creates a builder for an empty MXN account
    pub fn new() -> Self {
        Self {
            currency: Currency::MXN,
            legacy_advance: None,
            entries: Vec::new(),
            partial_payments: Vec::new(),
            actor: ActorFixtures::cashier(),
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the account's legacy advance field, as migrated from older records
    pub fn with_legacy_advance(mut self, amount: Decimal) -> Self {
        self.legacy_advance = Some(amount);
        self
    }

    /// Adds an advance entry
    pub fn advance(mut self, amount: Decimal) -> Self {
        self.entries.push(NewEntry::advance(amount));
        self
    }

    /// Adds a service charge
    pub fn service(mut self, quantity: Decimal, unit_price: Decimal) -> Self {
        self.entries.push(NewEntry::new(EntryKind::Service, quantity, unit_price));
        self
    }

    /// Adds a product charge
    pub fn product(mut self, quantity: Decimal, unit_price: Decimal) -> Self {
        self.entries.push(NewEntry::new(EntryKind::Product, quantity, unit_price));
        self
    }

    /// Adds a partial payment
    pub fn partial_payment(mut self, amount: Decimal) -> Self {
        self.partial_payments.push(amount);
        self
    }

    pub fn recorded_by(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    /// Builds the scenario
    ///
    /// # Errors
    ///
    /// Any error the domain constructors raise, e.g. `InvalidAmount` for a
    /// negative quantity.
    pub fn build(self) -> Result<LedgerScenario, BillingError> {
        let mut account = PatientAccount::open(LedgerFixtures::patient_ref(), self.currency, &self.actor);
        if let Some(legacy) = self.legacy_advance {
            account.advance_amount = Money::new(legacy, self.currency);
        }

        let entries = self
            .entries
            .into_iter()
            .map(|request| LedgerEntry::record(&account, request, &self.actor))
            .collect::<Result<Vec<_>, _>>()?;
        let payments = self
            .partial_payments
            .into_iter()
            .map(|amount| Payment::partial(&account, amount, PaymentMethod::Cash, &self.actor))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LedgerScenario {
            account,
            entries,
            payments,
        })
    }
}
