//! Physical resources
//!
//! Rooms and operating theaters are allocated exclusively, one active
//! allocation at a time. Stock items are depleted unit by unit and can never
//! go below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Actor, PortError, ResourceId};

use crate::allocation::{Allocation, IntervalRequest};
use crate::error::ResourceError;
use crate::stock::StockMovement;

/// What kind of asset a resource is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Room,
    OperatingTheater,
    Stock,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Room => "room",
            ResourceKind::OperatingTheater => "operating_theater",
            ResourceKind::Stock => "stock",
        }
    }

    /// Rooms and theaters are allocated; stock is deducted
    pub fn is_allocatable(&self) -> bool {
        !matches!(self, ResourceKind::Stock)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "room" => Ok(ResourceKind::Room),
            "operating_theater" => Ok(ResourceKind::OperatingTheater),
            "stock" => Ok(ResourceKind::Stock),
            other => Err(PortError::internal(format!("unknown resource kind '{}'", other))),
        }
    }
}

/// Availability of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Available,
    Occupied,
    Maintenance,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Available => "available",
            ResourceState::Occupied => "occupied",
            ResourceState::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceState {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ResourceState::Available),
            "occupied" => Ok(ResourceState::Occupied),
            "maintenance" => Ok(ResourceState::Maintenance),
            other => Err(PortError::internal(format!("unknown resource state '{}'", other))),
        }
    }
}

/// What a caller asks to reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationRequest {
    /// Exclusive use of a room or theater
    Interval(IntervalRequest),
    /// Deduction of stock units
    Units {
        quantity: i64,
        reason: String,
        reference_id: Option<String>,
    },
}

/// What a successful reservation produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reservation {
    Allocation(Allocation),
    StockDeduction(StockMovement),
}

/// A room, operating theater or stock item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    pub state: ResourceState,
    /// Units on hand; always zero for rooms and theaters
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Registers a new available resource
    pub fn register(kind: ResourceKind, name: impl Into<String>, initial_stock: i64) -> Result<Self, ResourceError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ResourceError::invalid("resource name must not be blank"));
        }
        if initial_stock < 0 {
            return Err(ResourceError::invalid(format!(
                "initial stock must be non-negative, got {}",
                initial_stock
            )));
        }
        if kind.is_allocatable() && initial_stock != 0 {
            return Err(ResourceError::invalid(format!("a {} carries no stock", kind)));
        }

        let now = Utc::now();
        Ok(Self {
            id: ResourceId::new_v7(),
            kind,
            name,
            state: ResourceState::Available,
            stock: initial_stock,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reserves this resource, given its currently active allocations
    ///
    /// The caller must hold the resource's row lock and persist both the
    /// updated resource and the returned reservation.
    pub fn reserve(
        &mut self,
        request: &ReservationRequest,
        active: &[Allocation],
        actor: &Actor,
    ) -> Result<Reservation, ResourceError> {
        match (self.kind.is_allocatable(), request) {
            (true, ReservationRequest::Interval(interval)) => {
                self.allocate(interval, active, actor).map(Reservation::Allocation)
            }
            (false, ReservationRequest::Units { quantity, reason, reference_id }) => self
                .deduct(*quantity, reason, reference_id.clone(), actor)
                .map(Reservation::StockDeduction),
            (true, ReservationRequest::Units { .. }) => Err(ResourceError::unavailable(
                self.id,
                format!("a {} is reserved by interval, not by units", self.kind),
            )),
            (false, ReservationRequest::Interval(_)) => Err(ResourceError::unavailable(
                self.id,
                "stock is reserved by units, not by interval",
            )),
        }
    }

    fn allocate(
        &mut self,
        request: &IntervalRequest,
        active: &[Allocation],
        actor: &Actor,
    ) -> Result<Allocation, ResourceError> {
        request.validate()?;

        match self.state {
            ResourceState::Available => {}
            ResourceState::Occupied => {
                return Err(ResourceError::unavailable(self.id, "already occupied"));
            }
            ResourceState::Maintenance => {
                return Err(ResourceError::unavailable(self.id, "under maintenance"));
            }
        }
        if active.iter().any(|a| a.overlaps(request.starts_at, request.ends_at)) {
            return Err(ResourceError::unavailable(self.id, "overlapping active allocation"));
        }

        let allocation = Allocation::new(self.id, request, actor);
        self.state = ResourceState::Occupied;
        self.updated_at = allocation.created_at;
        Ok(allocation)
    }

    fn deduct(
        &mut self,
        quantity: i64,
        reason: &str,
        reference_id: Option<String>,
        actor: &Actor,
    ) -> Result<StockMovement, ResourceError> {
        if quantity <= 0 {
            return Err(ResourceError::invalid(format!("quantity must be positive, got {}", quantity)));
        }
        if self.state == ResourceState::Maintenance {
            return Err(ResourceError::unavailable(self.id, "under maintenance"));
        }
        if self.stock < quantity {
            return Err(ResourceError::InsufficientStock {
                resource_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }

        self.stock -= quantity;
        let movement = StockMovement::new(self.id, -quantity, self.stock, reason, reference_id, actor);
        self.updated_at = movement.created_at;
        Ok(movement)
    }

    /// Adds units to a stock item
    pub fn restock(&mut self, quantity: i64, reason: &str, actor: &Actor) -> Result<StockMovement, ResourceError> {
        if self.kind.is_allocatable() {
            return Err(ResourceError::invalid(format!("a {} carries no stock", self.kind)));
        }
        if quantity <= 0 {
            return Err(ResourceError::invalid(format!("quantity must be positive, got {}", quantity)));
        }

        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| ResourceError::invalid("stock overflow"))?;
        let movement = StockMovement::new(self.id, quantity, self.stock, reason, None, actor);
        self.updated_at = movement.created_at;
        Ok(movement)
    }

    /// Frees an occupied room or theater; returns false if it was not occupied
    pub fn release(&mut self) -> bool {
        if self.state != ResourceState::Occupied {
            return false;
        }
        self.state = ResourceState::Available;
        self.updated_at = Utc::now();
        true
    }

    /// Moves between available and maintenance; returns false if unchanged
    pub fn set_maintenance(&mut self, maintenance: bool) -> Result<bool, ResourceError> {
        let target = if maintenance { ResourceState::Maintenance } else { ResourceState::Available };
        if self.state == target {
            return Ok(false);
        }
        if self.state == ResourceState::Occupied {
            return Err(ResourceError::unavailable(self.id, "occupied resources cannot change maintenance state"));
        }
        self.state = target;
        self.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AllocationPurpose;
    use core_kernel::Role;

    fn nurse() -> Actor {
        Actor::new("nurse-1", [Role::Nurse])
    }

    fn stay() -> ReservationRequest {
        ReservationRequest::Interval(IntervalRequest::open_ended(AllocationPurpose::Admission, Utc::now()))
    }

    fn units(quantity: i64) -> ReservationRequest {
        ReservationRequest::Units {
            quantity,
            reason: "dispensed".to_string(),
            reference_id: None,
        }
    }

    #[test]
    fn test_room_single_allocation() {
        let mut room = Resource::register(ResourceKind::Room, "Room 204", 0).unwrap();
        let first = room.reserve(&stay(), &[], &nurse()).unwrap();
        assert_eq!(room.state, ResourceState::Occupied);

        let Reservation::Allocation(allocation) = first else {
            panic!("expected an allocation");
        };
        let second = room.reserve(&stay(), &[allocation], &nurse());
        assert!(matches!(second, Err(ResourceError::ResourceUnavailable { .. })));

        assert!(room.release());
        assert!(!room.release());
        assert!(room.reserve(&stay(), &[], &nurse()).is_ok());
    }

    #[test]
    fn test_stock_never_negative() {
        let mut stock = Resource::register(ResourceKind::Stock, "Gauze", 5).unwrap();

        let Reservation::StockDeduction(movement) = stock.reserve(&units(3), &[], &nurse()).unwrap() else {
            panic!("expected a deduction");
        };
        assert_eq!(movement.quantity_delta, -3);
        assert_eq!(movement.balance_after, 2);

        let err = stock.reserve(&units(3), &[], &nurse()).unwrap_err();
        assert!(matches!(err, ResourceError::InsufficientStock { requested: 3, available: 2, .. }));
        assert_eq!(stock.stock, 2);

        assert!(matches!(stock.reserve(&units(0), &[], &nurse()), Err(ResourceError::InvalidRequest(_))));
    }

    #[test]
    fn test_reservation_shape_must_match_kind() {
        let mut theater = Resource::register(ResourceKind::OperatingTheater, "Theater 2", 0).unwrap();
        assert!(matches!(
            theater.reserve(&units(1), &[], &nurse()),
            Err(ResourceError::ResourceUnavailable { .. })
        ));

        let mut stock = Resource::register(ResourceKind::Stock, "Gloves", 10).unwrap();
        assert!(matches!(
            stock.reserve(&stay(), &[], &nurse()),
            Err(ResourceError::ResourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_maintenance_blocks_reservations() {
        let mut room = Resource::register(ResourceKind::Room, "Room 101", 0).unwrap();
        assert!(room.set_maintenance(true).unwrap());
        assert!(matches!(
            room.reserve(&stay(), &[], &nurse()),
            Err(ResourceError::ResourceUnavailable { .. })
        ));
        assert!(room.set_maintenance(false).unwrap());
        room.reserve(&stay(), &[], &nurse()).unwrap();
        assert!(room.set_maintenance(true).is_err());
    }

    #[test]
    fn test_register_validation() {
        assert!(Resource::register(ResourceKind::Stock, "Saline", -1).is_err());
        assert!(Resource::register(ResourceKind::Room, "Room 1", 3).is_err());
        assert!(Resource::register(ResourceKind::Room, "  ", 0).is_err());
    }

    #[test]
    fn test_restock() {
        let mut stock = Resource::register(ResourceKind::Stock, "Syringes", 0).unwrap();
        let movement = stock.restock(40, "delivery", &nurse()).unwrap();
        assert_eq!(movement.quantity_delta, 40);
        assert_eq!(stock.stock, 40);

        let mut room = Resource::register(ResourceKind::Room, "Room 3", 0).unwrap();
        assert!(room.restock(1, "n/a", &nurse()).is_err());
    }
}
