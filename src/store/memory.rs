//! In-process store backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{
    CounterStore, CredentialStore, KeyTtl, NewUser, StoreError, StoreResult, User,
};

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A thread-safe store kept in process memory.
///
/// Each key is guarded by its DashMap shard lock, which gives the same
/// per-key atomicity as the Redis commands it stands in for. Time uses the
/// tokio clock so tests can pause and advance it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    counters: Arc<DashMap<String, Counter>>,
    users: Arc<DashMap<u64, User>>,
    by_external_id: Arc<DashMap<String, u64>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Counter {
                value: 0,
                expires_at: None,
            };
        }
        entry.value += 1;
        Ok(entry.value)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let now = Instant::now();
        let Some(counter) = self.counters.get(key).map(|c| *c) else {
            return Ok(KeyTtl::Missing);
        };
        Ok(match counter.expires_at {
            None => KeyTtl::Persistent,
            Some(at) if at <= now => KeyTtl::Missing,
            // Round up like Redis so a live key never reports zero seconds.
            Some(at) => KeyTtl::Remaining((at - now).as_millis().div_ceil(1000) as u64),
        })
    }

    async fn expire(&self, key: &str, secs: u64) -> StoreResult<()> {
        let now = Instant::now();
        if let Some(mut counter) = self.counters.get_mut(key) {
            if !counter.is_expired(now) {
                counter.expires_at = Some(now + Duration::from_secs(secs));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let Some(id) = self.by_external_id.get(external_id).map(|r| *r.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        match self.by_external_id.entry(new_user.external_id.clone()) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                self.users
                    .get(&id)
                    .map(|u| u.value().clone())
                    .ok_or_else(|| StoreError::Corrupt(format!("dangling external id for user {id}")))
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let user = User {
                    id,
                    email: new_user.email,
                    external_id: new_user.external_id,
                    secret_hash: new_user.secret_hash,
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn replace_secret_hash(&self, id: u64, secret_hash: String) -> StoreResult<()> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::UserNotFound(id))?;
        user.secret_hash = secret_hash;
        Ok(())
    }
}
