//! Shared state subsystem.
//!
//! # Data Flow
//! ```text
//! security::rate_limit ──▶ CounterStore    (INCR / TTL / EXPIRE)
//! auth::rotation       ──▶ CredentialStore (find / create / replace hash)
//! auth::session        ──▶ CredentialStore (find by id)
//!
//! Backends:
//!     memory.rs  single instance, DashMap with per-key locking
//!     redis.rs   multi-instance, Redis atomic commands
//! ```
//!
//! # Design Decisions
//! - No cross-request coordination happens in process memory except through
//!   these traits, so swapping the backend is enough to scale out
//! - Hash replacement is last-write-wins

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StoreConfig;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Rotation targeted a user that does not exist.
    #[error("user {0} not found")]
    UserNotFound(u64),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Remaining lifetime of a counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist.
    Missing,
    /// Key exists without an expiry.
    Persistent,
    /// Key expires after this many seconds.
    Remaining(u64),
}

impl KeyTtl {
    /// Interpret a Redis `TTL` reply (-2 missing, -1 no expiry).
    pub fn from_redis(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            r if r < 0 => KeyTtl::Persistent,
            r => KeyTtl::Remaining(r as u64),
        }
    }
}

/// Atomic counters with expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the key by one, creating it at 1, and return the new value.
    async fn incr(&self, key: &str) -> StoreResult<u64>;

    /// Read the remaining lifetime of the key.
    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Set the key to expire `secs` seconds from now.
    async fn expire(&self, key: &str, secs: u64) -> StoreResult<()>;
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    /// Subject identifier assigned by the identity provider.
    pub external_id: String,
    /// PHC string of the current rotating secret.
    pub secret_hash: String,
}

/// Fields for a first-time login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub external_id: String,
    pub secret_hash: String,
}

/// Durable per-user credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>>;

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>>;

    /// Create a user. If another login created the same external id first,
    /// that record is returned unchanged.
    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    /// Overwrite the stored secret hash.
    async fn replace_secret_hash(&self, id: u64, secret_hash: String) -> StoreResult<()>;
}

/// The backends a server instance runs against.
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<dyn CounterStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Stores {
    /// Both roles served by one in-process store.
    pub fn memory() -> Self {
        let store = MemoryStore::new();
        Self {
            counters: Arc::new(store.clone()),
            credentials: Arc::new(store),
        }
    }

    /// Redis when a URL is configured, otherwise in process.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                Ok(Self {
                    counters: Arc::new(store.clone()),
                    credentials: Arc::new(store),
                })
            }
            None => {
                tracing::warn!("No redis_url configured, using in-process store (single instance only)");
                Ok(Self::memory())
            }
        }
    }
}
