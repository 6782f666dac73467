//! Bearer tokens.
//!
//! Sessions are stateless HS256 JWTs carrying the user id, tenant id, and
//! email. Roles are deliberately absent from the claims: every service reads
//! the caller's current role from the store.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::guard::Caller;

/// Token failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {reason}")]
    Invalid { reason: String },

    #[error("failed to sign token: {reason}")]
    Signing { reason: String },
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            email: claims.email,
        }
    }
}

/// Issues and verifies bearer tokens.
pub trait TokenVerifier: Send + Sync + 'static {
    /// # Errors
    ///
    /// [`TokenError::Signing`] if the token cannot be produced.
    fn issue(&self, caller: &Caller) -> Result<String, TokenError>;

    /// # Errors
    ///
    /// [`TokenError::Expired`] or [`TokenError::Invalid`].
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

/// HS256 JWTs with a shared secret.
pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokens")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtTokens {
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

fn unix(ts: i64) -> u64 {
    u64::try_from(ts).unwrap_or(0)
}

impl TokenVerifier for JwtTokens {
    fn issue(&self, caller: &Caller) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing {
                reason: format!("token lifetime {} is out of range", self.ttl),
            })?;
        let claims = Claims {
            sub: caller.user_id,
            tenant_id: caller.tenant_id,
            email: caller.email.clone(),
            iat: unix(now.timestamp()),
            exp: unix(expires.timestamp()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            TokenError::Signing {
                reason: e.to_string(),
            }
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid {
                    reason: e.to_string(),
                },
            })
    }
}
