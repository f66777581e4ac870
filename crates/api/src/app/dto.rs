use serde::{Deserialize, Serialize};

use warden_auth::{CapabilityMatrix, User};
use warden_core::{RoleId, ServiceId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(alias = "username")]
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub user_id: UserId,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNamedRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateServicePermissionRequest {
    pub service_id: ServiceId,
    pub role_id: RoleId,
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub can_manage: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MatrixResponse {
    pub user_id: UserId,
    pub matrix: CapabilityMatrix,
}
