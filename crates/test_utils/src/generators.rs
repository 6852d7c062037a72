//! Property-Based Test Generators
//!
//! proptest strategies for amounts and ledger rows. Amounts are generated in
//! minor units and scaled to two decimals, matching what the cash desk records.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::{EntryKind, NewEntry, PaymentMethod};

/// Strictly positive amounts with two decimals, up to 1,000,000.00
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Non-negative amounts with two decimals, zero included
pub fn non_negative_amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Quantities from 0 to 99.5 in half units, as dispensed on the ward
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..200i64).prop_map(|halves| Decimal::new(halves * 5, 1))
}

pub fn entry_kind_strategy() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        Just(EntryKind::Service),
        Just(EntryKind::Product),
        Just(EntryKind::Advance),
    ]
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Transfer),
        Just(PaymentMethod::Check),
    ]
}

/// Valid charge or advance requests
///
/// Advances are generated as quantity 1 at the advance amount.
pub fn new_entry_strategy() -> impl Strategy<Value = NewEntry> {
    (entry_kind_strategy(), quantity_strategy(), non_negative_amount_strategy()).prop_map(
        |(kind, quantity, price)| match kind {
            EntryKind::Advance => NewEntry::advance(price),
            other => NewEntry::new(other, quantity, price),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_amounts_have_two_decimals(amount in positive_amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() <= 2);
        }

        #[test]
        fn generated_entries_are_non_negative(entry in new_entry_strategy()) {
            prop_assert!(entry.quantity >= Decimal::ZERO);
            prop_assert!(entry.unit_price >= Decimal::ZERO);
        }
    }
}
