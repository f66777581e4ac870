//! `warden-auth` — identity, token, and permission logic.
//!
//! This crate is intentionally decoupled from HTTP and from any particular
//! database; storage sits behind [`IdentityStore`].

pub mod account;
pub mod claims;
pub mod in_memory;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod reconcile;
pub mod resolver;
pub mod roles;
pub mod store;
pub mod token;
pub mod user;
pub mod validator;

pub use account::{AccountService, LoginResult};
pub use claims::{Claims, validate_claims};
pub use in_memory::InMemoryIdentityStore;
pub use password::{Argon2Hasher, PasswordHasher};
pub use permissions::{
    Action, CapabilityMatrix, NewPermission, Permission, PermissionView, Service, capability_key,
};
pub use principal::Identity;
pub use reconcile::{ReconcileOutcome, RoleDiff, RoleReconciler};
pub use resolver::{PermissionResolver, merge};
pub use roles::{Role, UserRoleAssignment};
pub use store::IdentityStore;
pub use token::{DEFAULT_ISSUER, DEFAULT_TTL_HOURS, MAX_TTL_HOURS, TokenConfig, TokenService};
pub use user::{NewUser, User, UserUpdate, UserWithRoles, normalize_email, normalize_name};
pub use validator::TokenValidator;
