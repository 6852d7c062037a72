//! Resource handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Actor, ResourceId};
use domain_resources::{Reservation, ReservationRequest, Resource, StockMovement};

use crate::dto::resources::*;
use crate::{error::ApiError, AppState};

pub async fn register_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    request.validate()?;
    let resource = state
        .resources
        .register_resource(request.kind, &request.name, request.initial_stock, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// Allocates a room or theater, or deducts stock
pub async fn reserve(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let reservation = state
        .resources
        .reserve(ResourceId::from_uuid(id), request, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn release(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Resource>, ApiError> {
    let resource = state.resources.release(ResourceId::from_uuid(id), &actor).await?;
    Ok(Json(resource))
}

pub async fn restock(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<RestockRequest>,
) -> Result<(StatusCode, Json<StockMovement>), ApiError> {
    request.validate()?;
    let movement = state
        .resources
        .restock(ResourceId::from_uuid(id), request.quantity, &request.reason, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn set_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MaintenanceRequest>,
) -> Result<Json<Resource>, ApiError> {
    let resource = state
        .resources
        .set_maintenance(ResourceId::from_uuid(id), request.maintenance)
        .await?;
    Ok(Json(resource))
}

/// Stock journal, oldest first
pub async fn list_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    let movements = state.resources.movements(ResourceId::from_uuid(id)).await?;
    Ok(Json(movements))
}
