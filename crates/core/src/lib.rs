//! `warden-core` — identifiers and the error taxonomy shared by every crate.
//!
//! This crate contains no IO and no policy.

pub mod error;
pub mod id;

pub use error::{AuthError, AuthResult};
pub use id::{PermissionId, RoleId, ServiceId, UserId};
