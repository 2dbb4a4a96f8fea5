use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::EmployeeId;

/// Bearer tokens are issued for 24 hours.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,             // Subject (employee id)
    pub employee_id: EmployeeId, // Operator identity used for audit fields
    pub is_admin: bool,          // Admin flag
    pub exp: i64,                // Expiration timestamp
    pub iat: i64,                // Issued at timestamp
    pub iss: String,             // Issuer
    pub jti: String,             // JWT ID, the key for revocation
}

/// JWT Service - verifies bearer tokens.
///
/// Issuance belongs to the identity provider; `create_token` exists for
/// operator tooling and tests.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    /// Create new JWT service with secret and issuer
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    pub fn create_token(&self, employee_id: &EmployeeId, is_admin: bool) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(TOKEN_TTL_HOURS);

        let claims = Claims {
            sub: employee_id.to_string(),
            employee_id: employee_id.clone(),
            is_admin,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a JWT token
    ///
    /// Checks signature, expiry and issuer. Revocation is checked separately
    /// by the auth middleware.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}
