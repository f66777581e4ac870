//! Infrastructure layer: configuration, Postgres wiring, and the SQL-backed
//! identity store.

pub mod config;
pub mod db;
pub mod store;

pub use crate::config::{AppConfig, ConfigError, LogFormat, ValidatorMode};
pub use db::StorageHandle;
pub use store::PostgresIdentityStore;
