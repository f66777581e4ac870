//! Effective-permission resolution.
//!
//! A user's capability matrix is the OR-fold of every permission row of every
//! role they hold. OR is commutative and associative, so the result does not
//! depend on the order roles or rows are visited in.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use warden_core::{AuthError, AuthResult, RoleId, ServiceId, UserId};

use crate::{CapabilityMatrix, IdentityStore, Permission};

/// Fold `(service name, row)` pairs into a matrix.
///
/// Pure; used by [`PermissionResolver::resolve`] once names are known.
pub fn merge<'a, I>(rows: I) -> CapabilityMatrix
where
    I: IntoIterator<Item = (&'a str, &'a Permission)>,
{
    let mut matrix = CapabilityMatrix::new();
    for (service_name, row) in rows {
        matrix.grant(service_name, row);
    }
    matrix
}

/// Resolves a user's per-service capability matrix from storage.
pub struct PermissionResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for PermissionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> PermissionResolver<S>
where
    S: IdentityStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve the matrix for `user_id`.
    ///
    /// - unknown user, or a permission row whose service is gone → `NotFound`
    /// - zero roles → empty matrix
    /// - any storage failure aborts; no partial matrix is returned
    #[tracing::instrument(skip(self), err)]
    pub async fn resolve(&self, user_id: UserId) -> AuthResult<CapabilityMatrix> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AuthError::not_found(format!("user {user_id}")));
        }

        let role_ids: BTreeSet<RoleId> = self
            .store
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let mut rows: Vec<Permission> = Vec::new();
        for role_id in &role_ids {
            rows.extend(self.store.permissions_for_role(*role_id).await?);
        }

        // One batched lookup instead of one query per row.
        let service_ids: Vec<ServiceId> = rows
            .iter()
            .map(|p| p.service_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names: HashMap<ServiceId, String> = self
            .store
            .find_services(&service_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        if let Some(missing) = service_ids.iter().find(|id| !names.contains_key(id)) {
            return Err(AuthError::not_found(format!("service {missing}")));
        }

        let matrix = merge(rows.iter().map(|row| (names[&row.service_id].as_str(), row)));

        tracing::debug!(roles = role_ids.len(), keys = matrix.len(), "permissions resolved");
        Ok(matrix)
    }
}
