//! Postgres connection wiring.
//!
//! `StorageHandle` connects lazily: the first `pool().await` builds the pool,
//! and concurrent first callers all wait on that single attempt. A failed
//! attempt leaves the cell empty so a later call can retry.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

use warden_core::{AuthError, AuthResult};

use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug)]
pub struct StorageHandle {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: OnceCell<PgPool>,
}

impl StorageHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            pool: OnceCell::new(),
        }
    }

    /// `None` when no database URL is configured.
    pub fn from_config(config: &DatabaseConfig) -> Option<Self> {
        let url = config.url.as_deref().filter(|u| !u.is_empty())?;
        Some(Self {
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
            ..Self::new(url)
        })
    }

    /// The shared pool, connecting on first use.
    pub async fn pool(&self) -> AuthResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async move {
                tracing::info!(max_connections = self.max_connections, "connecting to postgres");
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect(&self.url)
                    .await
                    .map_err(|e| AuthError::storage(format!("connect failed: {e}")))?;

                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .map_err(|e| AuthError::storage(format!("connectivity check failed: {e}")))?;

                tracing::info!("postgres connection established");
                Ok::<_, AuthError>(pool)
            })
            .await
    }

    /// Create tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> AuthResult<()> {
        let pool = self.pool().await?;
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| AuthError::storage(format!("schema setup failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(url: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            url: url.map(str::to_string),
            max_connections: 3,
            acquire_timeout_secs: 1,
        }
    }

    #[test]
    fn no_url_means_no_handle() {
        assert!(StorageHandle::from_config(&db(None)).is_none());
        assert!(StorageHandle::from_config(&db(Some(""))).is_none());
    }

    #[test]
    fn handle_is_lazy() {
        let handle = StorageHandle::from_config(&db(Some("postgres://localhost/warden"))).unwrap();
        assert_eq!(handle.max_connections, 3);
        assert!(!handle.pool.initialized());
    }

    #[tokio::test]
    async fn failed_connect_is_a_storage_error_and_retryable() {
        let handle = StorageHandle::from_config(&db(Some("postgres://127.0.0.1:1/none"))).unwrap();
        assert!(matches!(handle.pool().await, Err(AuthError::Storage(_))));
        assert!(!handle.pool.initialized());
    }

    #[test]
    fn schema_declares_assignment_key() {
        assert!(SCHEMA.contains("PRIMARY KEY (user_id, role_id)"));
    }
}
