//! Actor identity and roles
//!
//! The authentication layer resolves every request to an [`Actor`]. Domain
//! services only ever ask two questions of it: who is acting (for the audit
//! reference stored on each row) and whether the actor holds elevated
//! authority (for receivable authorization).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Staff roles known to the hospital system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator
    Admin,
    /// Head of billing; may authorize receivables
    FinanceManager,
    /// Front-desk cashier
    Cashier,
    /// Admission / reception staff
    Receptionist,
    /// Nursing staff
    Nurse,
    /// Physician
    Doctor,
    /// Pharmacy and inventory staff
    Pharmacist,
}

impl Role {
    /// Returns the canonical string form of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::FinanceManager => "finance_manager",
            Role::Cashier => "cashier",
            Role::Receptionist => "receptionist",
            Role::Nurse => "nurse",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
        }
    }

    /// Returns true if the role carries elevated (receivable) authority
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::FinanceManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "finance_manager" => Ok(Role::FinanceManager),
            "cashier" => Ok(Role::Cashier),
            "receptionist" => Ok(Role::Receptionist),
            "nurse" => Ok(Role::Nurse),
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            other => Err(CoreError::validation(format!("unknown role '{}'", other))),
        }
    }
}

/// An authenticated staff member acting on the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable user reference (stored as `actor_ref` on persisted rows)
    pub id: String,
    /// Roles granted to the actor
    pub roles: Vec<Role>,
}

impl Actor {
    /// Creates an actor with the given roles
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Returns true if the actor holds the given role
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if any of the actor's roles carries elevated authority
    pub fn has_elevated_authority(&self) -> bool {
        self.roles.iter().any(Role::is_elevated)
    }

    /// Reference recorded on rows created by this actor
    pub fn reference(&self) -> &str {
        &self.id
    }
}
