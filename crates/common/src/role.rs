//! Ranked roles and the pre-validated caller context.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OwnerScope, UserId};

/// Capability rank of a caller. Ordering is meaningful: a higher role can do
/// everything a lower one can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    Admin,
    Owner,
}

impl Role {
    /// Returns true if this role ranks at least as high as `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Identity of the caller, already authenticated by the identity provider.
///
/// The core trusts this value and only checks it against the capability an
/// operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: UserId,
    pub role: Role,
    pub scope: OwnerScope,
}

impl ActorContext {
    pub fn new(user_id: UserId, role: Role, scope: OwnerScope) -> Self {
        Self {
            user_id,
            role,
            scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ranked() {
        assert!(Role::Employee < Role::Manager);
        assert!(Role::Manager < Role::Admin);
        assert!(Role::Admin < Role::Owner);
        assert!(Role::Owner.satisfies(Role::Manager));
        assert!(!Role::Employee.satisfies(Role::Manager));
    }

    #[test]
    fn parse_role() {
        assert_eq!("Manager".parse::<Role>(), Ok(Role::Manager));
        assert!("cashier".parse::<Role>().is_err());
    }
}
