//! Role-membership reconciliation.
//!
//! Converges the stored `(user, role)` assignment set to a caller-supplied
//! desired set by diffing against current state. Each insert/delete commits
//! on its own: a failure stops the run but keeps what was already applied, and
//! a retry recomputes the remaining diff. Concurrent runs for the same user
//! are not serialized here.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use warden_core::{AuthResult, RoleId, UserId};

use crate::{IdentityStore, UserRoleAssignment};

/// What a reconciliation run changed. Ids are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub added: Vec<RoleId>,
    pub removed: Vec<RoleId>,
    pub unchanged: Vec<RoleId>,
}

impl ReconcileOutcome {
    /// `true` when the stored set already matched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The set difference a reconciliation run will apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDiff {
    pub to_add: BTreeSet<RoleId>,
    pub to_remove: BTreeSet<RoleId>,
    pub unchanged: BTreeSet<RoleId>,
}

impl RoleDiff {
    /// `to_add = desired \ current`, `to_remove = current \ desired`.
    pub fn compute(current: &BTreeSet<RoleId>, desired: &BTreeSet<RoleId>) -> Self {
        Self {
            to_add: desired.difference(current).copied().collect(),
            to_remove: current.difference(desired).copied().collect(),
            unchanged: current.intersection(desired).copied().collect(),
        }
    }
}

pub struct RoleReconciler<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for RoleReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> RoleReconciler<S>
where
    S: IdentityStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Make the user's stored roles equal `desired` (duplicates/order ignored).
    ///
    /// Inserts run before deletes. The first failing step aborts the rest
    /// without rolling back earlier steps.
    #[tracing::instrument(skip(self, desired), fields(desired = desired.len()), err)]
    pub async fn reconcile(
        &self,
        user_id: UserId,
        desired: &[RoleId],
    ) -> AuthResult<ReconcileOutcome> {
        let desired: BTreeSet<RoleId> = desired.iter().copied().collect();
        let current: BTreeSet<RoleId> = self
            .store
            .assignments_for_user(user_id)
            .await?
            .into_iter()
            .map(|a| a.role_id)
            .collect();

        let diff = RoleDiff::compute(&current, &desired);

        for role_id in &diff.to_add {
            tracing::debug!(%user_id, %role_id, "assigning role");
            self.store
                .insert_assignment(UserRoleAssignment::new(user_id, *role_id))
                .await?;
        }

        for role_id in &diff.to_remove {
            tracing::debug!(%user_id, %role_id, "revoking role");
            let removed = self
                .store
                .delete_assignment(UserRoleAssignment::new(user_id, *role_id))
                .await?;
            if !removed {
                tracing::debug!(%user_id, %role_id, "assignment already gone");
            }
        }

        let outcome = ReconcileOutcome {
            added: diff.to_add.into_iter().collect(),
            removed: diff.to_remove.into_iter().collect(),
            unchanged: diff.unchanged.into_iter().collect(),
        };

        tracing::info!(
            %user_id,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            "roles reconciled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryIdentityStore, NewUser};
    use proptest::prelude::*;
    use warden_core::AuthError;

    fn ids(raw: &[i64]) -> Vec<RoleId> {
        raw.iter().copied().map(RoleId::new).collect()
    }

    async fn stored_roles(store: &InMemoryIdentityStore, user_id: UserId) -> BTreeSet<RoleId> {
        store
            .assignments_for_user(user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.role_id)
            .collect()
    }

    /// Store with one user and `roles` roles; returns (store, user, role ids).
    async fn fixture(roles: usize) -> (Arc<InMemoryIdentityStore>, UserId, Vec<RoleId>) {
        let store = Arc::new(InMemoryIdentityStore::new());
        let user = store
            .insert_user(NewUser {
                name: "u".into(),
                email: "u@x.io".into(),
                password_digest: String::new(),
            })
            .await
            .unwrap();
        let mut role_ids = Vec::new();
        for i in 0..roles {
            role_ids.push(store.insert_role(&format!("role-{i}")).await.unwrap().id);
        }
        (store, user.id, role_ids)
    }

    #[test]
    fn diff_of_12_and_23() {
        let current: BTreeSet<_> = ids(&[1, 2]).into_iter().collect();
        let desired: BTreeSet<_> = ids(&[2, 3]).into_iter().collect();
        let diff = RoleDiff::compute(&current, &desired);

        assert_eq!(diff.to_add, ids(&[3]).into_iter().collect());
        assert_eq!(diff.to_remove, ids(&[1]).into_iter().collect());
        assert_eq!(diff.unchanged, ids(&[2]).into_iter().collect());
    }

    #[tokio::test]
    async fn inserts_three_deletes_one_leaves_two() {
        let (store, uid, roles) = fixture(3).await;
        let reconciler = RoleReconciler::new(store.clone());
        reconciler.reconcile(uid, &roles[0..2]).await.unwrap();

        let writes_before = store.write_count();
        let outcome = reconciler.reconcile(uid, &roles[1..3]).await.unwrap();

        assert_eq!(outcome.added, vec![roles[2]]);
        assert_eq!(outcome.removed, vec![roles[0]]);
        assert_eq!(outcome.unchanged, vec![roles[1]]);
        assert_eq!(store.write_count() - writes_before, 2);
        assert_eq!(stored_roles(&store, uid).await, roles[1..3].iter().copied().collect());
    }

    #[tokio::test]
    async fn second_run_writes_nothing() {
        let (store, uid, roles) = fixture(3).await;
        let reconciler = RoleReconciler::new(store.clone());

        reconciler.reconcile(uid, &roles).await.unwrap();
        let writes = store.write_count();
        let outcome = reconciler.reconcile(uid, &roles).await.unwrap();

        assert!(outcome.is_noop());
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn duplicates_in_request_are_ignored() {
        let (store, uid, roles) = fixture(2).await;
        let reconciler = RoleReconciler::new(store.clone());
        let outcome = reconciler
            .reconcile(uid, &[roles[1], roles[0], roles[1]])
            .await
            .unwrap();
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(stored_roles(&store, uid).await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_role_aborts_with_not_found() {
        let (store, uid, _) = fixture(0).await;
        let err = RoleReconciler::new(store)
            .reconcile(uid, &ids(&[9999]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn partial_failure_is_resumable() {
        let (store, uid, roles) = fixture(4).await;
        let reconciler = RoleReconciler::new(store.clone());

        store.fail_writes_after(2);
        let err = reconciler.reconcile(uid, &roles).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        // The two committed inserts stay.
        assert_eq!(stored_roles(&store, uid).await.len(), 2);

        store.clear_write_failure();
        let outcome = reconciler.reconcile(uid, &roles).await.unwrap();
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(outcome.unchanged.len(), 2);
        assert_eq!(stored_roles(&store, uid).await, roles.iter().copied().collect());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// From any starting set to any desired set: converge, then stay put.
        #[test]
        fn converges_and_is_idempotent(
            start in prop::collection::vec(0usize..6, 0..8),
            desired in prop::collection::vec(0usize..6, 0..8),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (store, uid, roles) = fixture(6).await;
                let reconciler = RoleReconciler::new(store.clone());

                let start: Vec<RoleId> = start.into_iter().map(|i| roles[i]).collect();
                let desired: Vec<RoleId> = desired.into_iter().map(|i| roles[i]).collect();

                reconciler.reconcile(uid, &start).await.unwrap();
                reconciler.reconcile(uid, &desired).await.unwrap();
                let expected: BTreeSet<RoleId> = desired.iter().copied().collect();
                assert_eq!(stored_roles(&store, uid).await, expected);

                let writes = store.write_count();
                let again = reconciler.reconcile(uid, &desired).await.unwrap();
                assert!(again.is_noop());
                assert_eq!(store.write_count(), writes);
            });
        }
    }
}
