//! Custom Test Assertions
//!
//! Assertion helpers for money and error kinds that print the domain values
//! on failure instead of raw debug output.

use std::fmt::Debug;

use rust_decimal::Decimal;

use core_kernel::{ErrorKind, Money};
use domain_billing::{AccountTotals, BillingError};
use domain_resources::ResourceError;

/// Asserts that a Money value equals `expected` exactly
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Money mismatch: actual={}, expected={} {}",
        actual,
        actual.currency().symbol(),
        expected
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: &Money) {
    assert!(money.is_negative(), "Expected negative money, got {}", money);
}

/// Asserts the balance identity: pending = advance + partials - (services + products)
pub fn assert_balance_identity(totals: &AccountTotals) {
    let expected = totals.advance.amount() + totals.total_partial_payments.amount()
        - (totals.total_services.amount() + totals.total_products.amount());
    assert_eq!(
        totals.pending_balance.amount(),
        expected,
        "Pending balance {} does not satisfy the balance identity (expected {})",
        totals.pending_balance,
        expected
    );
}

/// Asserts that a billing result failed with the given error kind
pub fn assert_billing_error<T: Debug>(result: Result<T, BillingError>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", expected, value),
        Err(e) => assert_eq!(e.kind(), expected, "Unexpected error: {}", e),
    }
}

/// Asserts that a resource result failed with the given error kind
pub fn assert_resource_error<T: Debug>(result: Result<T, ResourceError>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", expected, value),
        Err(e) => assert_eq!(e.kind(), expected, "Unexpected error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_eq() {
        assert_money_eq(&Money::new(dec!(12.50), Currency::MXN), dec!(12.5));
    }

    #[test]
    #[should_panic(expected = "Money mismatch")]
    fn test_assert_money_eq_fails() {
        assert_money_eq(&Money::new(dec!(12.50), Currency::MXN), dec!(13));
    }

    #[test]
    fn test_assert_billing_error() {
        let result: Result<(), BillingError> = Err(BillingError::MissingReason);
        assert_billing_error(result, ErrorKind::MissingReason);
    }
}
