use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::dto::CreateNamedRequest;
use crate::app::{errors, services::AppServices};

/// GET /auth/roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.accounts.list_roles().await {
        Ok(roles) => (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateNamedRequest>,
) -> axum::response::Response {
    match services.accounts.create_role(&body.name).await {
        Ok(_) => errors::status_ack(StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}
