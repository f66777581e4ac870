//! Authorization error model.

use thiserror::Error;

/// Result type used across the identity and authorization layers.
pub type AuthResult<T> = Result<T, AuthError>;

/// Identity/authorization error.
///
/// Token and credential failures are kept distinct here so callers can log the
/// precise cause; the HTTP boundary collapses them into an opaque
/// `unauthorized` before anything reaches a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login failed (unknown email or password mismatch).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token is malformed, has a bad signature, or was issued by someone else.
    #[error("invalid token")]
    InvalidToken,

    /// Token signature is intact but `exp <= now`.
    #[error("token has expired")]
    ExpiredToken,

    /// A referenced user/role/service/permission does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique constraint violation (email, role name, service name, assignment).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backing store unavailable or failed mid-operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Gateway-level rejection. Never carries the underlying cause.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed input (empty names, bad email, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A remote validator could not be reached or answered garbage.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Hashing/encoding failure inside this process.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for failures that mean "the presented token is not acceptable".
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::ExpiredToken)
    }

    /// Collapse any validation failure into the opaque gateway error.
    ///
    /// Log `self` first; the cause is dropped here.
    pub fn into_unauthorized(self) -> Self {
        Self::Unauthorized
    }
}
