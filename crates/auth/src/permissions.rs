//! Services, per-(role, service) permission rows, and the capability matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use warden_core::{PermissionId, RoleId, ServiceId};

/// A downstream resource domain that permissions apply to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
}

/// One grant row: what `role_id` may do against `service_id`.
///
/// Several rows for the same pair are legal; consumers OR-merge them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub role_id: RoleId,
    pub service_id: ServiceId,
    pub read: bool,
    pub write: bool,
    pub manage: bool,
}

impl Permission {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Manage => self.manage,
        }
    }
}

/// A permission row before the store assigns its id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPermission {
    pub role_id: RoleId,
    pub service_id: ServiceId,
    pub read: bool,
    pub write: bool,
    pub manage: bool,
}

/// Permission row joined with the names it references (admin listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionView {
    pub id: PermissionId,
    pub service: Service,
    pub role: crate::Role,
    pub can_read: bool,
    pub can_write: bool,
    pub can_manage: bool,
}

/// Capability a permission row can grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Manage,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Read, Action::Write, Action::Manage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Manage => "manage",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matrix key for a service/action pair: `"<lowercased service>.<action>"`.
pub fn capability_key(service_name: &str, action: Action) -> String {
    format!("{}.{}", service_name.trim().to_lowercase(), action.as_str())
}

/// A user's effective permissions, keyed by [`capability_key`].
///
/// Backed by a `BTreeMap` so the JSON form is stable; ordering carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMatrix(BTreeMap<String, bool>);

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one permission row for `service_name` into the matrix.
    ///
    /// All three keys for the service are materialized; each value becomes
    /// the OR of what was already there and what this row grants.
    pub fn grant(&mut self, service_name: &str, row: &Permission) {
        for action in Action::ALL {
            let slot = self.0.entry(capability_key(service_name, action)).or_insert(false);
            *slot |= row.allows(action);
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    /// Absence of any grant means `false`.
    pub fn allows(&self, service_name: &str, action: Action) -> bool {
        self.get(&capability_key(service_name, action)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, bool> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(read: bool, write: bool, manage: bool) -> Permission {
        Permission {
            id: PermissionId::new(1),
            role_id: RoleId::new(1),
            service_id: ServiceId::new(1),
            read,
            write,
            manage,
        }
    }

    #[test]
    fn key_lowercases_service_name() {
        assert_eq!(capability_key("ServiceX", Action::Manage), "servicex.manage");
    }

    #[test]
    fn grant_materializes_all_three_keys() {
        let mut m = CapabilityMatrix::new();
        m.grant("Billing", &row(true, false, false));
        assert_eq!(m.len(), 3);
        assert_eq!(m.get("billing.read"), Some(true));
        assert_eq!(m.get("billing.write"), Some(false));
        assert_eq!(m.get("billing.manage"), Some(false));
    }

    #[test]
    fn later_false_never_clears_earlier_true() {
        let mut m = CapabilityMatrix::new();
        m.grant("billing", &row(false, true, false));
        m.grant("billing", &row(false, false, false));
        assert!(m.allows("billing", Action::Write));
        assert!(!m.allows("unknown", Action::Read));
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut m = CapabilityMatrix::new();
        m.grant("crm", &row(true, true, false));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"crm.manage": false, "crm.read": true, "crm.write": true})
        );
    }
}
