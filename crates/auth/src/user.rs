//! User accounts and the input-normalization rules applied before storage.

use serde::{Deserialize, Serialize};

use warden_core::{AuthError, AuthResult, UserId};

use crate::Role;

/// Stored user account.
///
/// The password digest never leaves the process: it is skipped on
/// serialization so a `User` can be returned from handlers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_digest: String,
}

/// A user that has not been persisted yet (the store assigns the id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_digest: String,
}

/// Partial update of a user's profile. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Normalize every present field with the same rules used on creation.
    pub fn normalized(self) -> AuthResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(|n| normalize_name("name", n)).transpose()?,
            email: self.email.as_deref().map(normalize_email).transpose()?,
        })
    }
}

/// A user together with the roles they currently hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

/// Trim + lowercase; reject anything without a local part and a domain.
pub fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::validation("invalid email format")),
    }
}

/// Trim a display name / entity name and reject blanks.
pub fn normalize_name(field: &str, name: &str) -> AuthResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::validation(format!("{field} cannot be empty")));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
    }

    #[test]
    fn email_without_domain_is_rejected() {
        assert!(normalize_email("alice@").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice").is_err());
    }

    #[test]
    fn digest_is_not_serialized() {
        let user = User {
            id: UserId::new(1),
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_digest: "$argon2id$secret".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_digest").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn update_normalizes_present_fields_only() {
        let update = UserUpdate {
            name: None,
            email: Some(" BOB@Example.com".into()),
        }
        .normalized()
        .unwrap();
        assert_eq!(update.name, None);
        assert_eq!(update.email.as_deref(), Some("bob@example.com"));

        let blank = UserUpdate {
            name: Some("   ".into()),
            email: None,
        };
        assert!(blank.normalized().is_err());
    }
}
