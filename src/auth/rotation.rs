//! Session rotation on external login.
//!
//! Every successful login replaces the user's stored secret hash. Tokens
//! embedding any earlier plaintext stop verifying at that moment, which is
//! the only revocation mechanism the gateway has.
//!
//! Two near-simultaneous logins for one user are last-write-wins: the
//! second write invalidates the token issued for the first.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::provider::ExternalIdentity;
use crate::auth::secret::{HashError, SecretHasher, SecretPlaintext};
use crate::store::{CredentialStore, NewUser, StoreError};

/// Errors raised while logging in or rotating.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user_id: u64,
    pub email: String,
    /// Plaintext to embed in the new token.
    pub secret: SecretPlaintext,
    /// Whether this login created the account.
    pub created: bool,
}

/// Rotates per-user secrets in the credential store.
#[derive(Clone)]
pub struct SessionRotation {
    store: Arc<dyn CredentialStore>,
    hasher: SecretHasher,
}

impl SessionRotation {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: SecretHasher) -> Self {
        Self { store, hasher }
    }

    /// Replace the user's secret and return the new plaintext.
    pub async fn rotate(&self, user_id: u64) -> Result<SecretPlaintext, RotationError> {
        let secret = SecretPlaintext::generate();
        let hash = self.hasher.hash_blocking(secret.clone()).await?;
        self.store.replace_secret_hash(user_id, hash).await?;

        tracing::info!(user_id, "Session secret rotated");
        Ok(secret)
    }

    /// Find or create the user for an external identity, then rotate once.
    ///
    /// New accounts get a starter secret first so a record never exists
    /// without a hash, even if the rotation below fails.
    pub async fn login(&self, identity: &ExternalIdentity) -> Result<LoginOutcome, RotationError> {
        let (user, created) = match self.store.find_by_external_id(&identity.external_id).await? {
            Some(user) => (user, false),
            None => {
                let starter = self.hasher.hash_blocking(SecretPlaintext::generate()).await?;
                let user = self
                    .store
                    .create(NewUser {
                        email: identity.email.clone(),
                        external_id: identity.external_id.clone(),
                        secret_hash: starter,
                    })
                    .await?;
                tracing::info!(user_id = user.id, "User created on first login");
                (user, true)
            }
        };

        let secret = self.rotate(user.id).await?;

        Ok(LoginOutcome {
            user_id: user.id,
            email: user.email,
            secret,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn identity(external_id: &str) -> ExternalIdentity {
        ExternalIdentity {
            external_id: external_id.to_string(),
            email: "dev@example.com".to_string(),
        }
    }

    fn setup() -> (MemoryStore, SessionRotation, SecretHasher) {
        let store = MemoryStore::new();
        let hasher = SecretHasher::with_params(1024, 1, 1).unwrap();
        let rotation = SessionRotation::new(Arc::new(store.clone()), hasher.clone());
        (store, rotation, hasher)
    }

    #[tokio::test]
    async fn test_first_login_creates_and_rotates() {
        let (store, rotation, hasher) = setup();

        let outcome = rotation.login(&identity("g-1")).await.unwrap();
        assert!(outcome.created);

        let user = store.find_by_id(outcome.user_id).await.unwrap().unwrap();
        assert!(hasher.verify(outcome.secret.expose(), &user.secret_hash).unwrap());
    }

    #[tokio::test]
    async fn test_second_login_replaces_secret() {
        let (store, rotation, hasher) = setup();

        let first = rotation.login(&identity("g-1")).await.unwrap();
        let second = rotation.login(&identity("g-1")).await.unwrap();

        assert!(!second.created);
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(store.user_count(), 1);

        let user = store.find_by_id(first.user_id).await.unwrap().unwrap();
        assert!(!hasher.verify(first.secret.expose(), &user.secret_hash).unwrap());
        assert!(hasher.verify(second.secret.expose(), &user.secret_hash).unwrap());
    }

    #[tokio::test]
    async fn test_rotate_unknown_user_fails() {
        let (_, rotation, _) = setup();
        assert!(matches!(
            rotation.rotate(404).await,
            Err(RotationError::Store(StoreError::UserNotFound(404)))
        ));
    }
}
