//! Token validation delegated to a trusted issuer over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use warden_auth::{Identity, TokenService, TokenValidator};
use warden_core::{AuthError, AuthResult};
use warden_infra::{AppConfig, ValidatorMode};

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    user: Identity,
}

/// Calls `POST <base>/auth/validate` with the caller's bearer token.
///
/// Any non-success status is an invalid token; transport failures (refused,
/// reset, client timeout) are `Upstream`.
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteValidator {
    pub fn new(base_url: &str, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/auth/validate", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenValidator for RemoteValidator {
    async fn validate(&self, token: &str) -> AuthResult<Identity> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::upstream(format!("validate request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            tracing::debug!(%status, endpoint = %self.endpoint, "remote validator rejected token");
            return Err(AuthError::InvalidToken);
        }

        let body: ValidateResponse = res
            .json()
            .await
            .map_err(|e| AuthError::upstream(format!("malformed validate response: {e}")))?;
        Ok(body.user)
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

/// Build the validator selected by `auth.validator.mode`.
pub fn build_validator(
    config: &AppConfig,
    tokens: Arc<TokenService>,
) -> AuthResult<Arc<dyn TokenValidator>> {
    match config.auth.validator.mode {
        ValidatorMode::Local => Ok(tokens as Arc<dyn TokenValidator>),
        ValidatorMode::Remote => {
            let base = config
                .auth
                .validator
                .remote_url
                .as_deref()
                .ok_or_else(|| AuthError::internal("remote validator without remote_url"))?;
            let remote = RemoteValidator::new(base, config.validator_timeout())?;
            Ok(Arc::new(remote) as Arc<dyn TokenValidator>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_normalized() {
        let v = RemoteValidator::new("http://auth.local:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(v.endpoint(), "http://auth.local:8080/auth/validate");
        assert_eq!(v.kind(), "remote");
    }

    #[tokio::test]
    async fn refused_connection_is_upstream() {
        let v = RemoteValidator::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        assert!(matches!(v.validate("t").await, Err(AuthError::Upstream(_))));
    }
}
