//! Account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Actor, PatientAccountId};
use domain_billing::{AccountStatement, ClosureOutcome, LedgerEntry, PatientAccount, Payment};

use crate::dto::accounts::*;
use crate::{error::ApiError, AppState};

/// Opens an account
pub async fn open_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<PatientAccount>), ApiError> {
    request.validate()?;
    let account = state
        .accounts
        .open_account(&request.patient_ref, request.currency, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Account with its rows, totals and receivable
pub async fn get_statement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountStatement>, ApiError> {
    let statement = state.accounts.statement(PatientAccountId::from_uuid(id)).await?;
    Ok(Json(statement))
}

/// Current totals, rounded for display
pub async fn get_totals(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TotalsResponse>, ApiError> {
    let totals = state.accounts.compute_totals(PatientAccountId::from_uuid(id)).await?;
    Ok(Json(totals.into()))
}

/// Appends a charge or advance
pub async fn append_entry(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<AppendEntryRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    request.validate()?;
    let entry = state
        .accounts
        .append_entry(PatientAccountId::from_uuid(id), request.into(), &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Records a partial payment
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    request.validate()?;
    let payment = state
        .accounts
        .record_partial_payment(PatientAccountId::from_uuid(id), request.amount, request.method, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Closes the account, freezing its totals
pub async fn close_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<CloseAccountRequest>,
) -> Result<Json<ClosureOutcome>, ApiError> {
    request.validate()?;
    let outcome = state
        .accounts
        .close(PatientAccountId::from_uuid(id), request.into(), &actor)
        .await?;
    Ok(Json(outcome))
}
