use serde::{Deserialize, Serialize};

use warden_core::{RoleId, UserId};

/// Named grant bundle. Permissions hang off a role, users hold roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Membership of a user in a role. Unique per `(user_id, role_id)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    pub user_id: UserId,
    pub role_id: RoleId,
}

impl UserRoleAssignment {
    pub fn new(user_id: UserId, role_id: RoleId) -> Self {
        Self { user_id, role_id }
    }
}
