use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use warden_auth::UserUpdate;
use warden_core::UserId;

use crate::app::dto::{AssignRolesRequest, CreateUserRequest, MatrixResponse};
use crate::app::{errors, services::AppServices};

/// GET /users - every user with the roles they hold
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.accounts.list_users().await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateUserRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .create_user(&body.name, &body.email, &body.password)
        .await
    {
        Ok(_) => errors::status_ack(StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// PUT /users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
    Json(body): Json<UserUpdate>,
) -> axum::response::Response {
    match services.accounts.update_user(id, body).await {
        Ok(_) => errors::status_ack(StatusCode::OK),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    match services.accounts.delete_user(id).await {
        Ok(()) => errors::status_ack(StatusCode::OK),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /users/roles - make the user's role set exactly `roles`
pub async fn assign_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<AssignRolesRequest>,
) -> axum::response::Response {
    // Unknown users would otherwise reconcile to an empty set silently.
    if let Err(e) = services.accounts.get_user(body.user_id).await {
        return errors::auth_error_to_response(e);
    }

    match services.reconciler.reconcile(body.user_id, &body.roles).await {
        Ok(_) => errors::status_ack(StatusCode::OK),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET /users/:id/permissions - effective capability matrix
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    match services.resolver.resolve(id).await {
        Ok(matrix) => {
            (StatusCode::OK, Json(MatrixResponse { user_id: id, matrix })).into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}
