//! Room and theater allocations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{Actor, AllocationId, PortError, ResourceId};

use crate::error::ResourceError;

/// Why a room or theater is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPurpose {
    Admission,
    Surgery,
}

impl AllocationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPurpose::Admission => "admission",
            AllocationPurpose::Surgery => "surgery",
        }
    }
}

impl FromStr for AllocationPurpose {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admission" => Ok(AllocationPurpose::Admission),
            "surgery" => Ok(AllocationPurpose::Surgery),
            other => Err(PortError::internal(format!("unknown allocation purpose '{}'", other))),
        }
    }
}

/// Requested period of exclusive use; `ends_at: None` is open-ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRequest {
    pub purpose: AllocationPurpose,
    /// Account or surgery the allocation serves
    pub reference_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl IntervalRequest {
    pub fn open_ended(purpose: AllocationPurpose, starts_at: DateTime<Utc>) -> Self {
        Self {
            purpose,
            reference_id: None,
            starts_at,
            ends_at: None,
        }
    }

    pub fn until(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn for_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ResourceError> {
        match self.ends_at {
            Some(end) if end <= self.starts_at => Err(ResourceError::invalid(format!(
                "interval ends at {} which is not after its start {}",
                end, self.starts_at
            ))),
            _ => Ok(()),
        }
    }
}

/// Exclusive hold on a room or theater
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub resource_id: ResourceId,
    pub purpose: AllocationPurpose,
    pub reference_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Allocation {
    pub(crate) fn new(resource_id: ResourceId, request: &IntervalRequest, actor: &Actor) -> Self {
        Self {
            id: AllocationId::new_v7(),
            resource_id,
            purpose: request.purpose,
            reference_id: request.reference_id.clone(),
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            active: true,
            created_by: actor.reference().to_string(),
            created_at: Utc::now(),
            released_at: None,
        }
    }

    /// Returns true if this allocation is active and shares any instant
    /// with `[starts_at, ends_at)`
    pub fn overlaps(&self, starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> bool {
        if !self.active {
            return false;
        }
        let begins_before_other_ends = ends_at.map_or(true, |end| self.starts_at < end);
        let other_begins_before_this_ends = self.ends_at.map_or(true, |end| starts_at < end);
        begins_before_other_ends && other_begins_before_this_ends
    }

    /// Deactivates the allocation
    pub fn release(&mut self, at: DateTime<Utc>) {
        self.active = false;
        self.released_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_kernel::Role;

    fn allocation(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> Allocation {
        let request = IntervalRequest {
            purpose: AllocationPurpose::Surgery,
            reference_id: Some("SRG-1".to_string()),
            starts_at,
            ends_at,
        };
        Allocation::new(ResourceId::new(), &request, &Actor::new("dr-1", [Role::Doctor]))
    }

    #[test]
    fn test_overlap_rules() {
        let t0 = Utc::now();
        let h = Duration::hours(1);
        let booked = allocation(t0, Some(t0 + h * 2));

        assert!(booked.overlaps(t0 + h, Some(t0 + h * 3)));
        assert!(booked.overlaps(t0 - h, None));
        assert!(!booked.overlaps(t0 + h * 2, Some(t0 + h * 3)));
        assert!(!booked.overlaps(t0 - h, Some(t0)));

        let open = allocation(t0, None);
        assert!(open.overlaps(t0 + h * 100, Some(t0 + h * 101)));
    }

    #[test]
    fn test_released_allocation_never_overlaps() {
        let t0 = Utc::now();
        let mut booked = allocation(t0, None);
        booked.release(t0);
        assert!(!booked.active);
        assert!(!booked.overlaps(t0, None));
    }

    #[test]
    fn test_reversed_interval_rejected() {
        let t0 = Utc::now();
        let request = IntervalRequest::open_ended(AllocationPurpose::Admission, t0).until(t0);
        assert!(request.validate().is_err());
    }
}
