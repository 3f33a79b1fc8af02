//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the user id and the plaintext of the
//! user's rotating secret. Signature and expiry are checked here; whether the
//! secret is still current is checked by [`crate::auth::session`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id, decimal.
    pub sub: String,
    /// Plaintext of the secret current at issuance.
    pub code: String,
    pub iat: u64,
    pub exp: u64,
}

impl SessionClaims {
    /// The numeric user id, if `sub` is well formed.
    pub fn subject_id(&self) -> Option<u64> {
        self.sub.parse().ok()
    }
}

/// Errors raised while issuing a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// A token failed verification.
///
/// Deliberately carries no reason; callers map it to "unauthenticated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session token")]
pub struct TokenInvalid;

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::from_secs(config.token_ttl_secs),
        )
    }

    /// Token lifetime applied by [`TokenService::issue`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token with the configured lifetime.
    pub fn issue(&self, subject_id: u64, secret_plaintext: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(subject_id, secret_plaintext, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        subject_id: u64,
        secret_plaintext: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = unix_now();
        self.sign(&SessionClaims {
            sub: subject_id.to_string(),
            code: secret_plaintext.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
        })
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, algorithm, structure and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenInvalid> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            TokenInvalid
        })?;
        if data.claims.subject_id().is_none() {
            tracing::debug!("Session token has a non-numeric subject");
            return Err(TokenInvalid);
        }
        Ok(data.claims)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
