//! Bearer token authentication.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::auth::secret::SecretHasher;
use crate::auth::token::TokenService;
use crate::store::CredentialStore;

/// Identity attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub email: String,
}

/// Authentication failed.
///
/// Expired, forged, rotated and unknown-user cases are indistinguishable
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("authentication required")]
pub struct AuthFailure;

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verifies bearer tokens against the credential store.
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
    store: Arc<dyn CredentialStore>,
    hasher: SecretHasher,
}

impl Authenticator {
    pub fn new(tokens: TokenService, store: Arc<dyn CredentialStore>, hasher: SecretHasher) -> Self {
        Self {
            tokens,
            store,
            hasher,
        }
    }

    /// Authenticate a raw token.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthFailure> {
        let claims = self.tokens.verify(token).map_err(|_| AuthFailure)?;
        let user_id = claims.subject_id().ok_or(AuthFailure)?;

        let user = match self.store.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(user_id, "Token subject no longer exists");
                return Err(AuthFailure);
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Credential lookup failed");
                return Err(AuthFailure);
            }
        };

        match self.hasher.verify_blocking(claims.code, user.secret_hash).await {
            Ok(true) => Ok(AuthenticatedUser {
                id: user.id,
                email: user.email,
            }),
            Ok(false) => {
                tracing::debug!(user_id, "Token secret has been rotated");
                Err(AuthFailure)
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Secret verification failed");
                Err(AuthFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::ExternalIdentity;
    use crate::auth::rotation::SessionRotation;
    use crate::store::MemoryStore;
    use std::time::Duration;

    struct Fixture {
        rotation: SessionRotation,
        tokens: TokenService,
        auth: Authenticator,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let hasher = SecretHasher::with_params(1024, 1, 1).unwrap();
        let tokens = TokenService::new(b"session-test-key-session-test-k!", Duration::from_secs(900));
        Fixture {
            rotation: SessionRotation::new(store.clone(), hasher.clone()),
            auth: Authenticator::new(tokens.clone(), store, hasher),
            tokens,
        }
    }

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            external_id: "google-123".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn test_fresh_token_authenticates() {
        let f = fixture();
        let login = f.rotation.login(&identity()).await.unwrap();
        let token = f.tokens.issue(login.user_id, login.secret.expose()).unwrap();

        let user = f.auth.authenticate(&token).await.unwrap();
        assert_eq!(
            user,
            AuthenticatedUser {
                id: login.user_id,
                email: "alice@example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_rotation_revokes_unexpired_token() {
        let f = fixture();
        let first = f.rotation.login(&identity()).await.unwrap();
        let t1 = f.tokens.issue(first.user_id, first.secret.expose()).unwrap();

        let second = f.rotation.login(&identity()).await.unwrap();
        let t2 = f.tokens.issue(second.user_id, second.secret.expose()).unwrap();

        assert!(f.tokens.verify(&t1).is_ok(), "t1 is still valid by time");
        assert_eq!(f.auth.authenticate(&t1).await, Err(AuthFailure));
        assert!(f.auth.authenticate(&t2).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let f = fixture();
        let token = f.tokens.issue(999, "whatever").unwrap();
        assert_eq!(f.auth.authenticate(&token).await, Err(AuthFailure));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let f = fixture();
        assert_eq!(f.auth.authenticate("garbage").await, Err(AuthFailure));
    }
}
