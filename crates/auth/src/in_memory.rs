use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_core::{AuthError, AuthResult, PermissionId, RoleId, ServiceId, UserId};

use crate::{
    IdentityStore, NewPermission, NewUser, Permission, Role, Service, User, UserRoleAssignment,
    UserUpdate,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    services: BTreeMap<ServiceId, Service>,
    permissions: BTreeMap<PermissionId, Permission>,
    assignments: BTreeSet<UserRoleAssignment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory identity store.
///
/// Intended for tests/dev. Every successful mutation bumps a write counter,
/// and writes can be made to fail after a budget to exercise partial-failure
/// paths.
#[derive(Debug)]
pub struct InMemoryIdentityStore {
    tables: RwLock<Tables>,
    writes: AtomicU64,
    fail_at: AtomicU64,
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            writes: AtomicU64::new(0),
            fail_at: AtomicU64::new(u64::MAX),
        }
    }
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutations so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Let `budget` more writes succeed, then fail every write with `Storage`.
    pub fn fail_writes_after(&self, budget: u64) {
        self.fail_at
            .store(self.write_count().saturating_add(budget), Ordering::SeqCst);
    }

    pub fn clear_write_failure(&self) {
        self.fail_at.store(u64::MAX, Ordering::SeqCst);
    }

    fn read(&self) -> AuthResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AuthError::storage("lock poisoned"))
    }

    fn write(&self) -> AuthResult<RwLockWriteGuard<'_, Tables>> {
        if self.write_count() >= self.fail_at.load(Ordering::SeqCst) {
            return Err(AuthError::storage("injected write failure"));
        }
        self.tables
            .write()
            .map_err(|_| AuthError::storage("lock poisoned"))
    }

    fn committed(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_user(&self, id: UserId) -> AuthResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: NewUser) -> AuthResult<User> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::conflict(format!("email '{}' already registered", user.email)));
        }
        let id = UserId::new(t.next_id());
        let user = User {
            id,
            name: user.name,
            email: user.email,
            password_digest: user.password_digest,
        };
        t.users.insert(id, user.clone());
        self.committed();
        Ok(user)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> AuthResult<User> {
        let mut t = self.write()?;
        if let Some(email) = &update.email {
            if t.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AuthError::conflict(format!("email '{email}' already registered")));
            }
        }
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::not_found(format!("user {id}")))?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        let user = user.clone();
        self.committed();
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> AuthResult<()> {
        let mut t = self.write()?;
        if t.users.remove(&id).is_none() {
            return Err(AuthError::not_found(format!("user {id}")));
        }
        t.assignments.retain(|a| a.user_id != id);
        self.committed();
        Ok(())
    }

    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn find_role(&self, id: RoleId) -> AuthResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn insert_role(&self, name: &str) -> AuthResult<Role> {
        let mut t = self.write()?;
        if t.roles.values().any(|r| r.name == name) {
            return Err(AuthError::conflict(format!("role '{name}' already exists")));
        }
        let role = Role {
            id: RoleId::new(t.next_id()),
            name: name.to_string(),
        };
        t.roles.insert(role.id, role.clone());
        self.committed();
        Ok(role)
    }

    async fn roles_for_user(&self, user_id: UserId) -> AuthResult<Vec<Role>> {
        let t = self.read()?;
        Ok(t.assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| t.roles.get(&a.role_id).cloned())
            .collect())
    }

    async fn list_services(&self) -> AuthResult<Vec<Service>> {
        Ok(self.read()?.services.values().cloned().collect())
    }

    async fn find_service(&self, id: ServiceId) -> AuthResult<Option<Service>> {
        Ok(self.read()?.services.get(&id).cloned())
    }

    async fn find_services(&self, ids: &[ServiceId]) -> AuthResult<Vec<Service>> {
        let t = self.read()?;
        Ok(ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| t.services.get(id).cloned())
            .collect())
    }

    async fn insert_service(&self, name: &str) -> AuthResult<Service> {
        let mut t = self.write()?;
        if t.services.values().any(|s| s.name == name) {
            return Err(AuthError::conflict(format!("service '{name}' already exists")));
        }
        let service = Service {
            id: ServiceId::new(t.next_id()),
            name: name.to_string(),
        };
        t.services.insert(service.id, service.clone());
        self.committed();
        Ok(service)
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> AuthResult<Vec<Permission>> {
        Ok(self
            .read()?
            .permissions
            .values()
            .filter(|p| p.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn permissions_for_service(&self, service_id: ServiceId) -> AuthResult<Vec<Permission>> {
        Ok(self
            .read()?
            .permissions
            .values()
            .filter(|p| p.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&permission.role_id) {
            return Err(AuthError::not_found(format!("role {}", permission.role_id)));
        }
        if !t.services.contains_key(&permission.service_id) {
            return Err(AuthError::not_found(format!("service {}", permission.service_id)));
        }
        let row = Permission {
            id: PermissionId::new(t.next_id()),
            role_id: permission.role_id,
            service_id: permission.service_id,
            read: permission.read,
            write: permission.write,
            manage: permission.manage,
        };
        t.permissions.insert(row.id, row.clone());
        self.committed();
        Ok(row)
    }

    async fn assignments_for_user(&self, user_id: UserId) -> AuthResult<Vec<UserRoleAssignment>> {
        Ok(self
            .read()?
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .copied()
            .collect())
    }

    async fn insert_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<()> {
        let mut t = self.write()?;
        if !t.users.contains_key(&assignment.user_id) {
            return Err(AuthError::not_found(format!("user {}", assignment.user_id)));
        }
        if !t.roles.contains_key(&assignment.role_id) {
            return Err(AuthError::not_found(format!("role {}", assignment.role_id)));
        }
        if !t.assignments.insert(assignment) {
            return Err(AuthError::conflict(format!(
                "user {} already holds role {}",
                assignment.user_id, assignment.role_id
            )));
        }
        self.committed();
        Ok(())
    }

    async fn delete_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<bool> {
        let mut t = self.write()?;
        let removed = t.assignments.remove(&assignment);
        if removed {
            self.committed();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "test".into(),
            email: email.into(),
            password_digest: String::new(),
        }
    }

    #[tokio::test]
    async fn unique_constraints_are_enforced() {
        let store = InMemoryIdentityStore::new();
        store.insert_user(new_user("a@x.io")).await.unwrap();
        assert!(matches!(
            store.insert_user(new_user("a@x.io")).await,
            Err(AuthError::Conflict(_))
        ));

        store.insert_role("admin").await.unwrap();
        assert!(matches!(store.insert_role("admin").await, Err(AuthError::Conflict(_))));

        store.insert_service("crm").await.unwrap();
        assert!(matches!(store.insert_service("crm").await, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn dangling_references_are_not_found() {
        let store = InMemoryIdentityStore::new();
        let role = store.insert_role("viewer").await.unwrap();

        let err = store
            .insert_permission(NewPermission {
                role_id: role.id,
                service_id: ServiceId::new(999),
                read: true,
                write: false,
                manage: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));

        let err = store
            .insert_assignment(UserRoleAssignment::new(UserId::new(999), role.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_user_drops_its_assignments() {
        let store = InMemoryIdentityStore::new();
        let user = store.insert_user(new_user("a@x.io")).await.unwrap();
        let role = store.insert_role("viewer").await.unwrap();
        store
            .insert_assignment(UserRoleAssignment::new(user.id, role.id))
            .await
            .unwrap();

        store.delete_user(user.id).await.unwrap();
        assert!(store.assignments_for_user(user.id).await.unwrap().is_empty());
        assert!(matches!(store.delete_user(user.id).await, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn injected_failures_stop_writes_but_not_reads() {
        let store = InMemoryIdentityStore::new();
        store.fail_writes_after(1);

        store.insert_role("one").await.unwrap();
        assert!(matches!(store.insert_role("two").await, Err(AuthError::Storage(_))));
        assert_eq!(store.list_roles().await.unwrap().len(), 1);
        assert_eq!(store.write_count(), 1);

        store.clear_write_failure();
        store.insert_role("two").await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn update_rejects_taken_email() {
        let store = InMemoryIdentityStore::new();
        store.insert_user(new_user("a@x.io")).await.unwrap();
        let b = store.insert_user(new_user("b@x.io")).await.unwrap();

        let err = store
            .update_user(
                b.id,
                UserUpdate {
                    name: None,
                    email: Some("a@x.io".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }
}
