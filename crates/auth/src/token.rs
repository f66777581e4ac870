//! Session token issuance and validation (HS256).
//!
//! The service is a pure function of its [`TokenConfig`] and the inputs it is
//! given; it holds no mutable state and can be shared freely across tasks.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use warden_core::{AuthError, AuthResult};

use crate::{Claims, Identity, validate_claims};

/// Issuer stamped into tokens when none is configured.
pub const DEFAULT_ISSUER: &str = "auth-svc";

/// Token lifetime when none is configured.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Longest lifetime a configuration may ask for (one year).
pub const MAX_TTL_HOURS: i64 = 24 * 366;

/// Immutable token configuration, injected at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Issues and validates signed session tokens.
pub struct TokenService {
    issuer: String,
    ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate_claims` against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            ttl: config.ttl,
            validation,
        }
    }

    /// Claims a token issued at `now` would carry.
    ///
    /// `expires_at` is truncated to whole seconds, matching its wire form.
    /// An expiry that overflows the calendar or falls before the Unix epoch
    /// cannot be encoded as `exp` and is refused.
    pub fn claims_for(&self, identity: &Identity, now: DateTime<Utc>) -> AuthResult<Claims> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .filter(|at| at.timestamp() >= 0)
            .ok_or_else(|| {
                AuthError::internal(format!("token lifetime {} not representable", self.ttl))
            })?;

        Ok(Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            iss: self.issuer.clone(),
            expires_at: expires_at.trunc_subsecs(0),
        })
    }

    pub fn issue(&self, identity: &Identity) -> AuthResult<String> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = self.claims_for(identity, now)?;
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))?;

        tracing::info!(
            user_id = %identity.user_id,
            expires_at = %claims.expires_at,
            "token issued"
        );
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        self.validate_at(token, Utc::now())
    }

    /// Verify encoding + signature + issuer, then the time window at `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use warden_core::UserId;

    const TEST_SECRET: &str = "test-secret-key-for-token-service";

    fn service() -> TokenService {
        TokenService::new(TokenConfig::new(TEST_SECRET))
    }

    fn alice() -> Identity {
        Identity::new(UserId::new(1), "alice@example.com")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issue_then_validate_returns_same_claims() {
        let svc = service();
        let token = svc.issue_at(&alice(), t0()).unwrap();

        let claims = svc.validate_at(&token, t0() + Duration::hours(1)).unwrap();
        assert_eq!(claims, svc.claims_for(&alice(), t0()).unwrap());
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.expires_at, t0() + Duration::hours(24));
        assert_eq!(claims.identity(), alice());
    }

    #[test]
    fn token_expires_exactly_at_ttl() {
        let svc = service();
        let token = svc.issue_at(&alice(), t0()).unwrap();
        let exp = t0() + Duration::hours(DEFAULT_TTL_HOURS);

        assert!(svc.validate_at(&token, exp - Duration::seconds(1)).is_ok());
        assert_eq!(svc.validate_at(&token, exp), Err(AuthError::ExpiredToken));
        assert_eq!(
            svc.validate_at(&token, exp + Duration::days(3)),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn real_clock_round_trip() {
        let svc = service();
        let token = svc.issue(&alice()).unwrap();
        assert_eq!(svc.validate(&token).unwrap().sub, UserId::new(1));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = service().issue_at(&alice(), t0()).unwrap();
        let other = TokenService::new(TokenConfig::new("another-secret-entirely"));
        assert_eq!(other.validate_at(&token, t0()), Err(AuthError::InvalidToken));
    }

    #[test]
    fn foreign_issuer_is_invalid() {
        let foreign = TokenService::new(TokenConfig::new(TEST_SECRET).with_issuer("billing-svc"));
        let token = foreign.issue_at(&alice(), t0()).unwrap();
        assert_eq!(service().validate_at(&token, t0()), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_is_invalid() {
        let svc = service();
        assert_eq!(svc.validate_at("", t0()), Err(AuthError::InvalidToken));
        assert_eq!(svc.validate_at("invalid.token.here", t0()), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_but_tampered_is_invalid_not_expired() {
        let svc = service();
        let token = svc.issue_at(&alice(), t0()).unwrap();
        let mut tampered = token.into_bytes();
        let mid = tampered.len() - 10;
        tampered[mid] = if tampered[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert_eq!(
            svc.validate_at(&tampered, t0() + Duration::days(30)),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let rendered = format!("{:?}", TokenConfig::new(TEST_SECRET));
        assert!(!rendered.contains(TEST_SECRET));
    }

    #[test]
    fn oversized_ttl_is_an_error_not_a_panic() {
        let svc = TokenService::new(
            TokenConfig::new(TEST_SECRET).with_ttl(Duration::hours(10_000_000_000)),
        );
        let err = svc.issue_at(&alice(), t0()).unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert!(svc.issue(&alice()).is_err());
    }

    #[test]
    fn expiry_before_epoch_is_refused_at_issue() {
        let svc = service();
        let then = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(svc.issue_at(&alice(), then), Err(AuthError::Internal(_))));
    }

    proptest! {
        #[test]
        fn any_byte_mutation_is_invalid(
            pick in any::<prop::sample::Index>(),
            alt in any::<bool>(),
        ) {
            let svc = service();
            let token = svc.issue_at(&alice(), t0()).unwrap();
            let pos = pick.index(token.len());

            let mut bytes = token.clone().into_bytes();
            let replacement = if alt { b'x' } else { b'Q' };
            bytes[pos] = if bytes[pos] == replacement { b'z' } else { replacement };
            let mutated = String::from_utf8(bytes).unwrap();

            prop_assert_eq!(svc.validate_at(&mutated, t0()), Err(AuthError::InvalidToken));
        }

        #[test]
        fn round_trip_for_any_identity(id in 1i64..i64::MAX, local in "[a-z]{1,12}") {
            let svc = service();
            let identity = Identity::new(UserId::new(id), format!("{local}@example.com"));
            let token = svc.issue_at(&identity, t0()).unwrap();
            let claims = svc.validate_at(&token, t0()).unwrap();
            prop_assert_eq!(claims.identity(), identity);
        }
    }
}
