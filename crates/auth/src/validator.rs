//! Pluggable token validation for the authorization gateway.
//!
//! The gateway only needs "token in, identity out". A service can validate
//! locally with its own [`TokenService`], or delegate to a trusted issuer
//! over the network; both sit behind this trait and are chosen by config.

use async_trait::async_trait;

use warden_core::AuthResult;

use crate::{Identity, TokenService};

#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Resolve a bearer token to the identity it was issued for.
    async fn validate(&self, token: &str) -> AuthResult<Identity>;

    /// Short label for logs ("local", "remote", ...).
    fn kind(&self) -> &'static str;
}

#[async_trait]
impl TokenValidator for TokenService {
    async fn validate(&self, token: &str) -> AuthResult<Identity> {
        TokenService::validate(self, token).map(|claims| claims.identity())
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
