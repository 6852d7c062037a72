//! Tests for core_kernel error types

use core_kernel::error::{CoreError, ErrorKind};
use core_kernel::money::MoneyError;

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::CurrencyMismatch("MXN".to_string(), "USD".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
}

#[test]
fn test_core_error_display() {
    let error = CoreError::validation("Test error");
    assert!(error.to_string().contains("Validation error"));
}

#[test]
fn test_error_kind_codes_are_stable() {
    let expected = [
        (ErrorKind::AccountClosed, "account_closed"),
        (ErrorKind::AccountAlreadyClosed, "account_already_closed"),
        (ErrorKind::UnsettledBalance, "unsettled_balance"),
        (ErrorKind::InsufficientAuthority, "insufficient_authority"),
        (ErrorKind::MissingReason, "missing_reason"),
        (ErrorKind::ResourceUnavailable, "resource_unavailable"),
        (ErrorKind::InsufficientStock, "insufficient_stock"),
        (ErrorKind::ExcessPayment, "excess_payment"),
        (ErrorKind::InvalidAmount, "invalid_amount"),
        (ErrorKind::NotFound, "not_found"),
        (ErrorKind::Transient, "transient"),
        (ErrorKind::Internal, "internal"),
    ];

    for (kind, code) in expected {
        assert_eq!(kind.as_str(), code);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{}\"", code));
    }
}

#[test]
fn test_error_kind_domain_classification() {
    assert!(ErrorKind::ExcessPayment.is_domain());
    assert!(!ErrorKind::Transient.is_domain());
    assert!(!ErrorKind::Internal.is_domain());
}
