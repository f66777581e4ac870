//! Account and grant administration: login, registration, user/role/service
//! CRUD, and permission rows.
//!
//! Pure orchestration over [`IdentityStore`], [`PasswordHasher`], and
//! [`TokenService`]; no transport concerns.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use warden_core::{AuthError, AuthResult, RoleId, ServiceId, UserId};

use crate::{
    IdentityStore, NewPermission, NewUser, PasswordHasher, Permission, PermissionView, Role,
    Service, TokenService, User, UserUpdate, UserWithRoles, normalize_email, normalize_name,
};

/// Successful login: a fresh token plus the account it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

/// Plaintext behind the decoy digest verified for unknown emails.
const DECOY_PASSWORD: &str = "warden-decoy-password";

pub struct AccountService<S: ?Sized> {
    store: Arc<S>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
    decoy_digest: Arc<OnceCell<String>>,
}

impl<S: ?Sized> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hasher: Arc::clone(&self.hasher),
            tokens: Arc::clone(&self.tokens),
            decoy_digest: Arc::clone(&self.decoy_digest),
        }
    }
}

impl<S> AccountService<S>
where
    S: IdentityStore + ?Sized,
{
    pub fn new(store: Arc<S>, hasher: Arc<dyn PasswordHasher>, tokens: Arc<TokenService>) -> Self {
        Self {
            store,
            hasher,
            tokens,
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller,
    /// in result and in work done: an unknown email is still verified against
    /// a decoy digest.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResult> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            let decoy = self.decoy_digest().await?.to_owned();
            self.verify_password(password, decoy).await?;
            tracing::info!(%email, "login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_password(password, user.password_digest.clone())
            .await?
        {
            tracing::info!(user_id = %user.id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(&(&user).into())?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(LoginResult { token, user })
    }

    /// Self-service sign-up.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<User> {
        let user = self.insert_with_password(username, email, password).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Validate a token issued by this service and load the account behind it.
    pub async fn current_user(&self, token: &str) -> AuthResult<User> {
        let claims = self.tokens.validate(token)?;
        self.store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("user {}", claims.sub)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self) -> AuthResult<Vec<UserWithRoles>> {
        let users = self.store.list_users().await?;
        let mut out = Vec::with_capacity(users.len());
        for user in users {
            let roles = self.store.roles_for_user(user.id).await?;
            out.push(UserWithRoles { user, roles });
        }
        Ok(out)
    }

    pub async fn get_user(&self, id: UserId) -> AuthResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("user {id}")))
    }

    /// Administrative creation; same rules as [`Self::register`].
    pub async fn create_user(&self, name: &str, email: &str, password: &str) -> AuthResult<User> {
        let user = self.insert_with_password(name, email, password).await?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> AuthResult<User> {
        let update = update.normalized()?;
        if update.is_empty() {
            return self.get_user(id).await;
        }
        self.store.update_user(id, update).await
    }

    pub async fn delete_user(&self, id: UserId) -> AuthResult<()> {
        self.store.delete_user(id).await?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn insert_with_password(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<User> {
        let name = normalize_name("username", name)?;
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::validation("password cannot be empty"));
        }

        let password_digest = self.hash_password(password).await?;
        self.store
            .insert_user(NewUser {
                name,
                email,
                password_digest,
            })
            .await
    }

    // Argon2 is CPU-bound; both directions run on the blocking pool.

    async fn hash_password(&self, plain: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, plain: &str, digest: String) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
            .await
            .map_err(|e| AuthError::internal(format!("verify task failed: {e}")))
    }

    async fn decoy_digest(&self) -> AuthResult<&str> {
        self.decoy_digest
            .get_or_try_init(|| self.hash_password(DECOY_PASSWORD))
            .await
            .map(String::as_str)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles & services
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn create_role(&self, name: &str) -> AuthResult<Role> {
        let name = normalize_name("role name", name)?;
        self.store.insert_role(&name).await
    }

    pub async fn list_services(&self) -> AuthResult<Vec<Service>> {
        self.store.list_services().await
    }

    pub async fn create_service(&self, name: &str) -> AuthResult<Service> {
        let name = normalize_name("service name", name)?;
        self.store.insert_service(&name).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// All permission rows targeting a service, joined with role names.
    pub async fn service_permissions(
        &self,
        service_id: ServiceId,
    ) -> AuthResult<Vec<PermissionView>> {
        let service = self
            .store
            .find_service(service_id)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("service {service_id}")))?;

        let rows = self.store.permissions_for_service(service_id).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let role = self
                .store
                .find_role(row.role_id)
                .await?
                .ok_or_else(|| AuthError::not_found(format!("role {}", row.role_id)))?;
            out.push(PermissionView {
                id: row.id,
                service: service.clone(),
                role,
                can_read: row.read,
                can_write: row.write,
                can_manage: row.manage,
            });
        }
        Ok(out)
    }

    pub async fn create_service_permission(
        &self,
        service_id: ServiceId,
        role_id: RoleId,
        read: bool,
        write: bool,
        manage: bool,
    ) -> AuthResult<Permission> {
        let row = self
            .store
            .insert_permission(NewPermission {
                role_id,
                service_id,
                read,
                write,
                manage,
            })
            .await?;
        tracing::info!(permission_id = %row.id, %role_id, %service_id, "permission created");
        Ok(row)
    }
}
