//! Account DTOs
//!
//! Amounts are JSON strings (`"1250.50"`); a JSON number is refused so no
//! amount is ever read through `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::Currency;
use domain_billing::{AccountTotals, CloseRequest, EntryKind, NewEntry, PaymentMethod};

#[derive(Debug, Deserialize, Validate)]
pub struct OpenAccountRequest {
    #[validate(length(min = 1, max = 64))]
    pub patient_ref: String,
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

fn default_currency() -> Currency {
    Currency::MXN
}

#[derive(Debug, Deserialize, Validate)]
pub struct AppendEntryRequest {
    pub kind: EntryKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 64))]
    pub item_ref: Option<String>,
}

impl From<AppendEntryRequest> for NewEntry {
    fn from(request: AppendEntryRequest) -> Self {
        NewEntry {
            kind: request.kind,
            quantity: request.quantity,
            unit_price: request.unit_price,
            description: request.description,
            item_ref: request.item_ref,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CloseAccountRequest {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount_paid_now: Option<Decimal>,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub authorize_receivable: bool,
    #[validate(length(max = 500))]
    pub receivable_reason: Option<String>,
}

impl From<CloseAccountRequest> for CloseRequest {
    fn from(request: CloseAccountRequest) -> Self {
        CloseRequest {
            amount_paid_now: request.amount_paid_now,
            method: request.method,
            authorize_receivable: request.authorize_receivable,
            receivable_reason: request.receivable_reason,
        }
    }
}

/// Totals as shown at the cash desk, rounded to the currency's minor unit
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    #[serde(flatten)]
    pub totals: AccountTotals,
    pub has_debt: bool,
}

impl From<AccountTotals> for TotalsResponse {
    fn from(totals: AccountTotals) -> Self {
        let totals = totals.rounded();
        Self {
            has_debt: totals.has_debt(),
            totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_keeps_every_digit() {
        let request: PaymentRequest = serde_json::from_str(r#"{"amount": "1234567890123456.78"}"#).unwrap();
        assert_eq!(request.amount, dec!(1234567890123456.78));
        assert_eq!(request.method, PaymentMethod::Cash);
    }

    #[test]
    fn test_numeric_amount_refused() {
        let result = serde_json::from_str::<PaymentRequest>(r#"{"amount": 1234567890123456.78}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<AppendEntryRequest>(
            r#"{"kind": "service", "quantity": 1, "unit_price": "10.00"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_settlement_amount_is_optional() {
        let request: CloseAccountRequest = serde_json::from_str(r#"{"authorize_receivable": true}"#).unwrap();
        assert_eq!(request.amount_paid_now, None);

        let request: CloseAccountRequest =
            serde_json::from_str(r#"{"amount_paid_now": "0.10", "method": "card"}"#).unwrap();
        assert_eq!(request.amount_paid_now, Some(dec!(0.10)));

        let request: CloseAccountRequest = serde_json::from_str(r#"{"amount_paid_now": null}"#).unwrap();
        assert_eq!(request.amount_paid_now, None);
    }
}
