//! Receivable handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Actor, ReceivableId};
use domain_billing::{ReceivablePayment, ReceivableRecord};

use crate::dto::receivables::*;
use crate::{error::ApiError, AppState};

/// Lists outstanding receivables, oldest first
pub async fn list_outstanding(
    State(state): State<AppState>,
    Query(params): Query<ListReceivablesParams>,
) -> Result<Json<Vec<ReceivableRecord>>, ApiError> {
    params.validate()?;
    let receivables = state.accounts.list_outstanding(&params.into()).await?;
    Ok(Json(receivables))
}

/// Payment sub-ledger of a receivable
pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReceivablePayment>>, ApiError> {
    let payments = state.accounts.receivable_payments(ReceivableId::from_uuid(id)).await?;
    Ok(Json(payments))
}

/// Applies a payment against a receivable
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReceivablePaymentRequest>,
) -> Result<Json<ReceivableRecord>, ApiError> {
    request.validate()?;
    let receivable = state
        .accounts
        .record_receivable_payment(ReceivableId::from_uuid(id), request.amount, request.method, &actor)
        .await?;
    Ok(Json(receivable))
}
