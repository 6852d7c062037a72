//! Unit tests for the Money module
//!
//! Tests cover creation, exact arithmetic, rounding at the formatting
//! boundary, and currency handling.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50), Currency::MXN);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::MXN);
    }

    #[test]
    fn test_new_does_not_round() {
        let m = Money::new(dec!(33.333333), Currency::MXN);
        assert_eq!(m.amount(), dec!(33.333333));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_default_currency_is_mxn() {
        assert_eq!(Currency::default(), Currency::MXN);
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_and_sub() {
        let a = Money::new(dec!(10000), Currency::MXN);
        let b = Money::new(dec!(5000), Currency::MXN);

        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(15000));
        assert_eq!(b.checked_sub(&a).unwrap().amount(), dec!(-5000));
    }

    #[test]
    fn test_checked_mul_keeps_precision() {
        let unit_price = Money::new(dec!(12.345), Currency::MXN);
        let subtotal = unit_price.checked_mul(dec!(3)).unwrap();
        assert_eq!(subtotal.amount(), dec!(37.035));
    }

    #[test]
    fn test_mismatched_currency_rejected() {
        let mxn = Money::new(dec!(1), Currency::MXN);
        let usd = Money::new(dec!(1), Currency::USD);

        assert_eq!(
            mxn.checked_sub(&usd),
            Err(MoneyError::CurrencyMismatch("MXN".to_string(), "USD".to_string()))
        );
    }

    #[test]
    fn test_overflow_reported() {
        let max = Money::new(Decimal::MAX, Currency::MXN);
        assert_eq!(max.checked_add(&max), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_negation_and_abs() {
        let debt = -Money::new(dec!(5000), Currency::MXN);
        assert!(debt.is_negative());
        assert_eq!(debt.abs().amount(), dec!(5000));
    }
}

mod formatting {
    use super::*;

    #[test]
    fn test_round_to_currency_half_away_from_zero() {
        assert_eq!(Money::new(dec!(2.345), Currency::MXN).round_to_currency().amount(), dec!(2.35));
        assert_eq!(Money::new(dec!(-2.345), Currency::MXN).round_to_currency().amount(), dec!(-2.35));
    }

    #[test]
    fn test_display_rounds_only_for_output() {
        let m = Money::new(dec!(1234.5678), Currency::USD);
        assert_eq!(m.to_string(), "$ 1234.57");
        assert_eq!(m.amount(), dec!(1234.5678));
    }

    #[test]
    fn test_serde_roundtrip_preserves_amount() {
        let m = Money::new(dec!(0.105), Currency::MXN);
        let json = serde_json::to_string(&m).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
