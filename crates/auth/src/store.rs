//! Credential/persistence boundary consumed by the authorization engine.
//!
//! Implementations own uniqueness and referential integrity:
//! - duplicate email / role name / service name / assignment → `Conflict`
//! - permission or assignment referencing a missing row → `NotFound`
//! - anything the backend cannot complete → `Storage`

use async_trait::async_trait;

use warden_core::{AuthResult, RoleId, ServiceId, UserId};

use crate::{
    NewPermission, NewUser, Permission, Role, Service, User, UserRoleAssignment, UserUpdate,
};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    // Users

    async fn find_user(&self, id: UserId) -> AuthResult<Option<User>>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    async fn list_users(&self) -> AuthResult<Vec<User>>;

    async fn insert_user(&self, user: NewUser) -> AuthResult<User>;

    /// `NotFound` if the user does not exist.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> AuthResult<User>;

    /// Removes the user and its role assignments. `NotFound` if absent.
    async fn delete_user(&self, id: UserId) -> AuthResult<()>;

    // Roles

    async fn list_roles(&self) -> AuthResult<Vec<Role>>;

    async fn find_role(&self, id: RoleId) -> AuthResult<Option<Role>>;

    async fn insert_role(&self, name: &str) -> AuthResult<Role>;

    /// Roles currently held by `user_id` (empty if none).
    async fn roles_for_user(&self, user_id: UserId) -> AuthResult<Vec<Role>>;

    // Services

    async fn list_services(&self) -> AuthResult<Vec<Service>>;

    async fn find_service(&self, id: ServiceId) -> AuthResult<Option<Service>>;

    /// Batched lookup. Missing ids are simply absent from the result.
    async fn find_services(&self, ids: &[ServiceId]) -> AuthResult<Vec<Service>>;

    async fn insert_service(&self, name: &str) -> AuthResult<Service>;

    // Permissions

    async fn permissions_for_role(&self, role_id: RoleId) -> AuthResult<Vec<Permission>>;

    async fn permissions_for_service(&self, service_id: ServiceId) -> AuthResult<Vec<Permission>>;

    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission>;

    // Assignments

    async fn assignments_for_user(&self, user_id: UserId) -> AuthResult<Vec<UserRoleAssignment>>;

    async fn insert_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<()>;

    /// Returns whether a row was actually removed.
    async fn delete_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<bool>;
}
