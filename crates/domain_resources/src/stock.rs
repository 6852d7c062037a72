//! Stock movement journal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Actor, ResourceId, StockMovementId};

/// One change to a stock item's quantity
///
/// Deductions carry a negative delta, restocks a positive one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub resource_id: ResourceId,
    pub quantity_delta: i64,
    /// Stock on hand after this movement
    pub balance_after: i64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub actor_ref: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub(crate) fn new(
        resource_id: ResourceId,
        quantity_delta: i64,
        balance_after: i64,
        reason: &str,
        reference_id: Option<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            id: StockMovementId::new_v7(),
            resource_id,
            quantity_delta,
            balance_after,
            reason: reason.to_string(),
            reference_id,
            actor_ref: actor.reference().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_deduction(&self) -> bool {
        self.quantity_delta < 0
    }
}
