use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_core::AuthError;

/// Map a domain error to its HTTP response.
///
/// Token and credential failures collapse to the same opaque 401; storage and
/// internal failures are logged and reported without detail.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid credentials")
        }
        AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::Unauthorized => {
            unauthorized()
        }
        AuthError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        AuthError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AuthError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthError::Upstream(msg) => {
            tracing::error!(%msg, "upstream failure");
            json_error(StatusCode::BAD_GATEWAY, "upstream_error", "upstream unavailable")
        }
        AuthError::Storage(msg) => {
            tracing::error!(%msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "internal error")
        }
        AuthError::Internal(msg) => {
            tracing::error!(%msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn unauthorized() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// `{"status": <code>}` acknowledgement used by create/update/delete routes.
pub fn status_ack(status: StatusCode) -> axum::response::Response {
    (status, axum::Json(json!({ "status": status.as_u16() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::ExpiredToken, StatusCode::UNAUTHORIZED),
            (AuthError::not_found("user 1"), StatusCode::NOT_FOUND),
            (AuthError::conflict("dup"), StatusCode::CONFLICT),
            (AuthError::validation("bad"), StatusCode::BAD_REQUEST),
            (AuthError::upstream("down"), StatusCode::BAD_GATEWAY),
            (AuthError::storage("boom"), StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(err).status(), status);
        }
    }
}
