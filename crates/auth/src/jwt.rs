//! Signed token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 shared-secret validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        // Expiry lives in `expires_at`, checked by `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use stockbook_core::TenantId;

    use crate::{PrincipalId, Role};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn fresh_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::MANAGER],
            issued_at: now - Duration::seconds(5),
            expires_at: now + Duration::minutes(5),
        }
    }

    #[test]
    fn round_trips_a_signed_token() {
        let claims = fresh_claims();
        let token = mint("s3cret", &claims);
        let got = Hs256JwtValidator::new("s3cret")
            .validate(&token, Utc::now())
            .unwrap();
        assert_eq!(got, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("s3cret", &fresh_claims());
        let err = Hs256JwtValidator::new("other")
            .validate(&token, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn expired_claims_are_rejected_after_signature_check() {
        let token = mint("s3cret", &fresh_claims());
        let err = Hs256JwtValidator::new("s3cret")
            .validate(&token, Utc::now() + Duration::hours(1))
            .unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }
}
