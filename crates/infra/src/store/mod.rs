//! SQL-backed implementations of `warden_auth::IdentityStore`.

mod postgres;

pub use postgres::PostgresIdentityStore;
