//! Resource domain errors

use thiserror::Error;

use core_kernel::{ErrorKind, PortError, ResourceId};

/// Errors that can occur while reserving or managing resources
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Room or theater occupied, under maintenance, or not reservable that way
    #[error("Resource {resource_id} is unavailable: {reason}")]
    ResourceUnavailable { resource_id: ResourceId, reason: String },

    /// Requested quantity exceeds the stock on hand
    #[error("Insufficient stock for {resource_id}: requested {requested}, available {available}")]
    InsufficientStock {
        resource_id: ResourceId,
        requested: i64,
        available: i64,
    },

    /// Non-positive quantity, negative initial stock or reversed interval
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    /// Failure reported by the persistence port
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl ResourceError {
    pub fn unavailable(resource_id: ResourceId, reason: impl Into<String>) -> Self {
        ResourceError::ResourceUnavailable {
            resource_id,
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ResourceError::InvalidRequest(message.into())
    }

    /// Returns the stable error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            ResourceError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            ResourceError::InvalidRequest(_) => ErrorKind::InvalidAmount,
            ResourceError::NotFound(_) => ErrorKind::NotFound,
            ResourceError::Store(e) if e.is_transient() => ErrorKind::Transient,
            ResourceError::Store(e) if e.is_not_found() => ErrorKind::NotFound,
            ResourceError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
