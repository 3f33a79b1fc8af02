//! Rotating secret generation and slow hashing.
//!
//! Secrets are 32 bytes from the OS RNG, hex encoded. Hashes are Argon2id
//! PHC strings; the cost comes from [`AuthConfig`] and is tuned so a hash
//! takes tens of milliseconds. Hashing runs on the blocking pool.

use std::fmt;

use argon2::{
    password_hash::{
        rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher as _, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::config::AuthConfig;

/// Bytes of entropy per secret.
pub const SECRET_BYTES: usize = 32;

/// Errors raised by [`SecretHasher`].
#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),

    #[error("hashing failed: {0}")]
    Hashing(String),

    #[error("stored hash is not a valid PHC string")]
    InvalidHashFormat,

    #[error("hashing task aborted: {0}")]
    Join(String),
}

/// Plaintext of a rotating secret. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPlaintext(String);

impl SecretPlaintext {
    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretPlaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretPlaintext(..)")
    }
}

/// Argon2id hasher for rotating secrets.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, HashError> {
        Self::with_params(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret with a fresh salt.
    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut SaltRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| HashError::Hashing(e.to_string()))
    }

    /// Check a secret against a stored hash.
    ///
    /// The comparison is constant-time inside the argon2 crate.
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|_| HashError::InvalidHashFormat)?;
        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Hashing(e.to_string())),
        }
    }

    /// [`SecretHasher::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, secret: SecretPlaintext) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(secret.expose()))
            .await
            .map_err(|e| HashError::Join(e.to_string()))?
    }

    /// [`SecretHasher::verify`] on the blocking pool.
    pub async fn verify_blocking(&self, secret: String, hash: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| HashError::Join(e.to_string()))?
    }
}
