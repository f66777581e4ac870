//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | AuthError | Scenario |
//! |------------|----------------------|-----------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | duplicate email / role / service name, repeated assignment |
//! | Database (foreign key violation) | `23503` | `NotFound` | permission or assignment pointing at a missing row |
//! | RowNotFound | N/A | `NotFound` | |
//! | anything else | N/A | `Storage` | connection loss, pool closed, decode failures |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use warden_auth::{
    IdentityStore, NewPermission, NewUser, Permission, Role, Service, User, UserRoleAssignment,
    UserUpdate,
};
use warden_core::{AuthError, AuthResult, PermissionId, RoleId, ServiceId, UserId};

use crate::db::StorageHandle;

const USER_COLUMNS: &str = "id, name, email, password_digest";
const PERMISSION_COLUMNS: &str = "id, role_id, service_id, can_read, can_write, can_manage";

/// Identity store over the shared, lazily-connected pool.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    handle: Arc<StorageHandle>,
}

impl PostgresIdentityStore {
    pub fn new(handle: Arc<StorageHandle>) -> Self {
        Self { handle }
    }

    async fn pool(&self) -> AuthResult<&PgPool> {
        self.handle.pool().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_digest: row.try_get("password_digest")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::new(row.try_get("id")?),
        name: row.try_get("name")?,
    })
}

fn service_from_row(row: &PgRow) -> Result<Service, sqlx::Error> {
    Ok(Service {
        id: ServiceId::new(row.try_get("id")?),
        name: row.try_get("name")?,
    })
}

fn permission_from_row(row: &PgRow) -> Result<Permission, sqlx::Error> {
    Ok(Permission {
        id: PermissionId::new(row.try_get("id")?),
        role_id: RoleId::new(row.try_get("role_id")?),
        service_id: ServiceId::new(row.try_get("service_id")?),
        read: row.try_get("can_read")?,
        write: row.try_get("can_write")?,
        manage: row.try_get("can_manage")?,
    })
}

fn decode_all<T>(
    operation: &str,
    rows: Vec<PgRow>,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> AuthResult<Vec<T>> {
    rows.iter()
        .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

fn decode_one<T>(
    operation: &str,
    row: Option<PgRow>,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> AuthResult<Option<T>> {
    row.as_ref()
        .map(decode)
        .transpose()
        .map_err(|e| map_sqlx_error(operation, e))
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    // ── users ────────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn find_user(&self, id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        decode_one("find_user", row, user_from_row)
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        decode_one("find_user_by_email", row, user_from_row)
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        decode_all("list_users", rows, user_from_row)
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn insert_user(&self, user: NewUser) -> AuthResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, password_digest) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_digest)
        .fetch_one(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("insert_user", e))
    }

    #[instrument(skip(self, update), err)]
    async fn update_user(&self, id: UserId, update: UserUpdate) -> AuthResult<User> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(update.name)
        .bind(update.email)
        .fetch_optional(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        decode_one("update_user", row, user_from_row)?
            .ok_or_else(|| AuthError::not_found(format!("user {id}")))
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&self, id: UserId) -> AuthResult<()> {
        // user_roles rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        if result.rows_affected() == 0 {
            return Err(AuthError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    // ── roles ────────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        decode_all("list_roles", rows, role_from_row)
    }

    #[instrument(skip(self), err)]
    async fn find_role(&self, id: RoleId) -> AuthResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.get())
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        decode_one("find_role", row, role_from_row)
    }

    #[instrument(skip(self), err)]
    async fn insert_role(&self, name: &str) -> AuthResult<Role> {
        let row = sqlx::query("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("insert_role", e))
    }

    #[instrument(skip(self), err)]
    async fn roles_for_user(&self, user_id: UserId) -> AuthResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(user_id.get())
        .fetch_all(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("roles_for_user", e))?;
        decode_all("roles_for_user", rows, role_from_row)
    }

    // ── services ─────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn list_services(&self) -> AuthResult<Vec<Service>> {
        let rows = sqlx::query("SELECT id, name FROM services ORDER BY id")
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("list_services", e))?;
        decode_all("list_services", rows, service_from_row)
    }

    #[instrument(skip(self), err)]
    async fn find_service(&self, id: ServiceId) -> AuthResult<Option<Service>> {
        let row = sqlx::query("SELECT id, name FROM services WHERE id = $1")
            .bind(id.get())
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find_service", e))?;
        decode_one("find_service", row, service_from_row)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn find_services(&self, ids: &[ServiceId]) -> AuthResult<Vec<Service>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query("SELECT id, name FROM services WHERE id = ANY($1) ORDER BY id")
            .bind(raw)
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("find_services", e))?;
        decode_all("find_services", rows, service_from_row)
    }

    #[instrument(skip(self), err)]
    async fn insert_service(&self, name: &str) -> AuthResult<Service> {
        let row = sqlx::query("INSERT INTO services (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("insert_service", e))?;
        service_from_row(&row).map_err(|e| map_sqlx_error("insert_service", e))
    }

    // ── permissions ──────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn permissions_for_role(&self, role_id: RoleId) -> AuthResult<Vec<Permission>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE role_id = $1 ORDER BY id"
        ))
        .bind(role_id.get())
        .fetch_all(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("permissions_for_role", e))?;
        decode_all("permissions_for_role", rows, permission_from_row)
    }

    #[instrument(skip(self), err)]
    async fn permissions_for_service(&self, service_id: ServiceId) -> AuthResult<Vec<Permission>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE service_id = $1 ORDER BY id"
        ))
        .bind(service_id.get())
        .fetch_all(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("permissions_for_service", e))?;
        decode_all("permissions_for_service", rows, permission_from_row)
    }

    #[instrument(skip(self), err)]
    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO permissions (role_id, service_id, can_read, can_write, can_manage)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(permission.role_id.get())
        .bind(permission.service_id.get())
        .bind(permission.read)
        .bind(permission.write)
        .bind(permission.manage)
        .fetch_one(self.pool().await?)
        .await
        .map_err(|e| map_sqlx_error("insert_permission", e))?;
        permission_from_row(&row).map_err(|e| map_sqlx_error("insert_permission", e))
    }

    // ── assignments ──────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn assignments_for_user(&self, user_id: UserId) -> AuthResult<Vec<UserRoleAssignment>> {
        let rows = sqlx::query("SELECT role_id FROM user_roles WHERE user_id = $1 ORDER BY role_id")
            .bind(user_id.get())
            .fetch_all(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("assignments_for_user", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<i64, _>("role_id")
                    .map(|role_id| UserRoleAssignment::new(user_id, RoleId::new(role_id)))
                    .map_err(|e| map_sqlx_error("assignments_for_user", e))
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn insert_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(assignment.user_id.get())
            .bind(assignment.role_id.get())
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("insert_assignment", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_assignment(&self, assignment: UserRoleAssignment) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(assignment.user_id.get())
            .bind(assignment.role_id.get())
            .execute(self.pool().await?)
            .await
            .map_err(|e| map_sqlx_error("delete_assignment", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuthError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => AuthError::Conflict(msg),
                Some("23503") => AuthError::NotFound(msg),
                _ => AuthError::Storage(msg),
            }
        }
        sqlx::Error::RowNotFound => AuthError::not_found(format!("{operation}: no matching row")),
        other => AuthError::storage(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error("find_user", sqlx::Error::RowNotFound),
            AuthError::NotFound(_)
        ));
    }

    #[test]
    fn transport_errors_map_to_storage() {
        let err = map_sqlx_error("list_roles", sqlx::Error::PoolClosed);
        assert!(matches!(err, AuthError::Storage(ref m) if m.starts_with("list_roles")));
    }

    #[tokio::test]
    async fn unreachable_database_surfaces_as_storage_error() {
        let handle = Arc::new(StorageHandle::new("postgres://127.0.0.1:1/none"));
        let store = PostgresIdentityStore::new(handle);
        assert!(matches!(store.list_users().await, Err(AuthError::Storage(_))));
    }
}
