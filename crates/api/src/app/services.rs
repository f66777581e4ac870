//! Service wiring: storage selection and the engines handlers call into.

use std::sync::Arc;
use std::time::Duration;

use warden_auth::{
    AccountService, Argon2Hasher, IdentityStore, InMemoryIdentityStore, PermissionResolver,
    RoleReconciler, TokenConfig, TokenService, TokenValidator,
};
use warden_core::{AuthError, AuthResult};
use warden_infra::{AppConfig, PostgresIdentityStore, StorageHandle};

use crate::remote;

pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a handler may need, shared behind one `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: AccountService<dyn IdentityStore>,
    pub resolver: PermissionResolver<dyn IdentityStore>,
    pub reconciler: RoleReconciler<dyn IdentityStore>,
    pub validator: Arc<dyn TokenValidator>,
    pub validator_timeout: Duration,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        tokens: Arc<TokenService>,
        validator: Arc<dyn TokenValidator>,
        validator_timeout: Duration,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), Arc::new(Argon2Hasher::new()), tokens),
            resolver: PermissionResolver::new(store.clone()),
            reconciler: RoleReconciler::new(store),
            validator,
            validator_timeout,
        }
    }

    /// In-memory store, local validation (dev/test).
    pub fn in_memory(token_config: TokenConfig) -> Self {
        let store: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());
        let tokens = Arc::new(TokenService::new(token_config));
        let validator: Arc<dyn TokenValidator> = tokens.clone();
        Self::new(store, tokens, validator, DEFAULT_VALIDATOR_TIMEOUT)
    }

    /// Swap the gateway's validator, keeping storage and token issuance.
    pub fn with_validator(
        mut self,
        validator: Arc<dyn TokenValidator>,
        timeout: Duration,
    ) -> Self {
        self.validator = validator;
        self.validator_timeout = timeout;
        self
    }
}

/// Wire services from configuration.
///
/// With `database.url` set, the Postgres store is used and the schema is
/// ensured up front; otherwise everything lives in memory.
pub async fn build_services(config: &AppConfig) -> AuthResult<AppServices> {
    let token_config = config
        .token_config()
        .map_err(|e| AuthError::validation(e.to_string()))?;
    let tokens = Arc::new(TokenService::new(token_config));
    let validator = remote::build_validator(config, tokens.clone())?;

    let store: Arc<dyn IdentityStore> = match StorageHandle::from_config(&config.database) {
        Some(handle) => {
            let handle = Arc::new(handle);
            handle.ensure_schema().await?;
            Arc::new(PostgresIdentityStore::new(handle))
        }
        None => {
            tracing::warn!("database.url not set; using in-memory identity store");
            Arc::new(InMemoryIdentityStore::new())
        }
    };

    tracing::info!(validator = validator.kind(), "services wired");
    Ok(AppServices::new(store, tokens, validator, config.validator_timeout()))
}
