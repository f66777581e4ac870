use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use warden_auth::{Identity, TokenValidator};
use warden_core::{AuthError, AuthResult};

use crate::app::errors;
use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<dyn TokenValidator>,
    pub timeout: Duration,
}

/// Reject the request with an opaque 401 unless its bearer token validates
/// within `timeout`. The concrete cause only goes to the log.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let identity = match authenticate(&state, req.headers()).await {
        Ok(identity) => identity,
        Err(cause) => {
            if cause.is_token_error() {
                tracing::info!(
                    validator = state.validator.kind(),
                    path = %req.uri().path(),
                    %cause,
                    "request rejected"
                );
            } else {
                tracing::warn!(
                    validator = state.validator.kind(),
                    path = %req.uri().path(),
                    %cause,
                    "request rejected"
                );
            }
            return errors::auth_error_to_response(cause.into_unauthorized());
        }
    };

    req.extensions_mut().insert(CallerContext::new(identity));
    next.run(req).await
}

async fn authenticate(state: &AuthState, headers: &HeaderMap) -> AuthResult<Identity> {
    let token = extract_bearer(headers).map_err(|_| AuthError::Unauthorized)?;

    tokio::time::timeout(state.timeout, state.validator.validate(token))
        .await
        .map_err(|_| {
            AuthError::upstream(format!("validation timed out after {:?}", state.timeout))
        })?
}

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_is_extracted_and_trimmed() {
        assert_eq!(extract_bearer(&headers("Bearer abc ")).unwrap(), "abc");
    }

    struct Fixed(AuthError);

    #[async_trait::async_trait]
    impl TokenValidator for Fixed {
        async fn validate(&self, _token: &str) -> AuthResult<Identity> {
            Err(self.0.clone())
        }

        fn kind(&self) -> &'static str {
            "fixed"
        }
    }

    fn state(err: AuthError) -> AuthState {
        AuthState {
            validator: Arc::new(Fixed(err)),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn every_cause_collapses_to_one_opaque_401() {
        let causes = [
            AuthError::ExpiredToken,
            AuthError::InvalidToken,
            AuthError::upstream("issuer down"),
            AuthError::storage("db gone"),
        ];
        for cause in causes {
            let err = authenticate(&state(cause.clone()), &headers("Bearer t"))
                .await
                .unwrap_err();
            assert_eq!(err, cause);

            let res = errors::auth_error_to_response(err.into_unauthorized());
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn malformed_headers_are_unauthorized() {
        assert!(extract_bearer(&HeaderMap::new()).is_err());
        assert!(extract_bearer(&headers("Basic abc")).is_err());
        assert!(extract_bearer(&headers("Bearer   ")).is_err());
    }
}
