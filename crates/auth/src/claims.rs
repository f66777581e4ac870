use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{AuthError, UserId};

use crate::Identity;

/// Signed token payload.
///
/// Field names follow the registered JWT claim names so tokens interoperate
/// with other services sharing the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: UserId,

    pub email: String,

    /// Issuer: the name of the service that signed the token.
    pub iss: String,

    /// Expiration (unix seconds on the wire).
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub, self.email.clone())
    }
}

/// Deterministically check the time window of already-verified claims.
///
/// A token is valid while `now < expires_at`; the boundary itself is expired.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if now >= claims.expires_at {
        return Err(AuthError::ExpiredToken);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims_expiring_at(exp: DateTime<Utc>) -> Claims {
        Claims {
            sub: UserId::new(5),
            email: "a@b.c".into(),
            iss: "auth-svc".into(),
            expires_at: exp,
        }
    }

    #[test]
    fn boundary_is_expired() {
        let exp = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let claims = claims_expiring_at(exp);

        assert!(validate_claims(&claims, exp - Duration::seconds(1)).is_ok());
        assert_eq!(validate_claims(&claims, exp), Err(AuthError::ExpiredToken));
        assert_eq!(
            validate_claims(&claims, exp + Duration::hours(1)),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn exp_is_unix_seconds_on_the_wire() {
        let exp = Utc.timestamp_opt(1_900_000_000, 0).unwrap();
        let json = serde_json::to_value(claims_expiring_at(exp)).unwrap();
        assert_eq!(json["exp"], 1_900_000_000i64);
        assert_eq!(json["sub"], 5);
        assert_eq!(json["iss"], "auth-svc");
    }
}
