//! API error handling
//!
//! Domain errors keep their stable kind code in the response body. Store
//! failures are reported by kind only; the underlying database message is
//! logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use core_kernel::ErrorKind;
use domain_billing::BillingError;
use domain_resources::ResourceError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// A classified failure from a domain service
    #[error("{message}")]
    Domain { kind: ErrorKind, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// HTTP status for a domain error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientAuthority => StatusCode::FORBIDDEN,
        ErrorKind::AccountClosed
        | ErrorKind::AccountAlreadyClosed
        | ErrorKind::ResourceUnavailable
        | ErrorKind::InsufficientStock => StatusCode::CONFLICT,
        ErrorKind::UnsettledBalance
        | ErrorKind::MissingReason
        | ErrorKind::ExcessPayment
        | ErrorKind::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn domain(kind: ErrorKind, detail: String) -> Self {
        let message = match kind {
            ErrorKind::Transient => {
                warn!(error = %detail, "Transient store failure");
                "The service is temporarily unavailable; retry the request".to_string()
            }
            ErrorKind::Internal => {
                error!(error = %detail, "Internal store failure");
                "Internal server error".to_string()
            }
            _ => detail,
        };
        ApiError::Domain { kind, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Domain { kind, message } => (status_for(kind), kind.as_str(), message),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::domain(err.kind(), err.to_string())
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::domain(err.kind(), err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InsufficientAuthority), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::InsufficientStock), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::UnsettledBalance), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Transient), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_detail_not_exposed() {
        let err: ApiError = BillingError::Store(PortError::connection("password authentication failed")).into();
        match err {
            ApiError::Domain { kind, message } => {
                assert_eq!(kind, ErrorKind::Transient);
                assert!(!message.contains("password"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_domain_message_kept() {
        let err: ApiError = BillingError::MissingReason.into();
        assert!(matches!(err, ApiError::Domain { kind: ErrorKind::MissingReason, .. }));
    }
}
