//! Login, registration, and the token-validation endpoint other services
//! call when they delegate validation here.

use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::app::dto::{LoginRequest, RegisterRequest, UserEnvelope};
use crate::app::{errors, services::AppServices};
use crate::middleware::extract_bearer;

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    match services.accounts.login(&body.email, &body.password).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .register(&body.username, &body.email, &body.password)
        .await
    {
        Ok(_) => errors::status_ack(StatusCode::CREATED),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/validate - resolve the bearer token to its user.
pub async fn validate(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Ok(token) = extract_bearer(&headers) else {
        return errors::unauthorized();
    };

    match services.accounts.current_user(token).await {
        Ok(user) => (StatusCode::OK, Json(UserEnvelope { user })).into_response(),
        Err(e) => {
            tracing::debug!(cause = %e, "token validation failed");
            errors::auth_error_to_response(e)
        }
    }
}
