//! Pre-built Test Fixtures
//!
//! Ready-to-use actors, amounts and references for the ledger and resource
//! test suites. Actor fixtures are deterministic; patient references are
//! randomized with `fake` so parallel tests never collide on them.

use fake::Fake;
use fake::faker::name::en::LastName;
use rust_decimal_macros::dec;

use core_kernel::{Actor, Currency, Money, Role};
use domain_billing::{EntryKind, NewEntry};

/// Actors holding each role the ledger cares about
pub struct ActorFixtures;

impl ActorFixtures {
    /// Front-desk cashier; may record charges and payments but not authorize receivables
    pub fn cashier() -> Actor {
        Actor::new("cashier-01", [Role::Cashier])
    }

    /// Finance manager; elevated authority
    pub fn finance_manager() -> Actor {
        Actor::new("finance-01", [Role::FinanceManager])
    }

    /// Administrator; elevated authority
    pub fn admin() -> Actor {
        Actor::new("admin-01", [Role::Admin])
    }

    pub fn receptionist() -> Actor {
        Actor::new("reception-01", [Role::Receptionist])
    }

    pub fn nurse() -> Actor {
        Actor::new("nurse-01", [Role::Nurse])
    }

    pub fn pharmacist() -> Actor {
        Actor::new("pharmacy-01", [Role::Pharmacist])
    }
}

/// Amounts in the ledger's default currency
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn mxn(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::MXN)
    }

    /// A typical admission advance
    pub fn mxn_advance() -> Money {
        Money::new(dec!(10000.00), Currency::MXN)
    }

    pub fn mxn_zero() -> Money {
        Money::zero(Currency::MXN)
    }
}

/// Patient references and ledger requests
pub struct LedgerFixtures;

impl LedgerFixtures {
    /// A unique patient reference such as `PAT-GARCIA-48213`
    pub fn patient_ref() -> String {
        let surname: String = LastName().fake();
        let number: u32 = (10_000u32..99_999u32).fake();
        format!("PAT-{}-{}", surname.to_uppercase(), number)
    }

    /// One night in a standard room
    pub fn room_night() -> NewEntry {
        NewEntry::new(EntryKind::Service, dec!(1), dec!(3000.00)).with_description("Room night")
    }

    /// Dispensed medication
    pub fn medication(units: rust_decimal::Decimal) -> NewEntry {
        NewEntry::new(EntryKind::Product, units, dec!(250.00))
            .with_description("Paracetamol 500mg")
            .with_item_ref("MED-0042")
    }
}
