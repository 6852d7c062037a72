//! Receivable DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use core_kernel::PatientAccountId;
use domain_billing::{PaymentMethod, ReceivableQuery, ReceivableState};

/// Query string of `GET /receivables`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListReceivablesParams {
    pub state: Option<ReceivableState>,
    pub account_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}

impl From<ListReceivablesParams> for ReceivableQuery {
    fn from(params: ListReceivablesParams) -> Self {
        ReceivableQuery {
            state: params.state,
            account_id: params.account_id.map(PatientAccountId::from_uuid),
            created_from: params.created_from,
            created_to: params.created_to,
            limit: params.limit,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceivablePaymentRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
}
