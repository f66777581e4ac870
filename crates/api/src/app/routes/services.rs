//! Downstream services and the permission rows that target them.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use warden_core::ServiceId;

use crate::app::dto::{CreateNamedRequest, CreateServicePermissionRequest};
use crate::app::{errors, services::AppServices};

/// GET /auth/services
pub async fn list_services(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.accounts.list_services().await {
        Ok(list) => (StatusCode::OK, Json(serde_json::json!({ "services": list }))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/services
pub async fn create_service(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateNamedRequest>,
) -> axum::response::Response {
    match services.accounts.create_service(&body.name).await {
        Ok(_) => errors::status_ack(StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET /auth/services/:id/permissions
pub async fn service_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ServiceId>,
) -> axum::response::Response {
    match services.accounts.service_permissions(id).await {
        Ok(rows) => {
            (StatusCode::OK, Json(serde_json::json!({ "permissions": rows }))).into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/services/permissions
pub async fn create_service_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateServicePermissionRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .create_service_permission(
            body.service_id,
            body.role_id,
            body.can_read,
            body.can_write,
            body.can_manage,
        )
        .await
    {
        Ok(_) => errors::status_ack(StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}
