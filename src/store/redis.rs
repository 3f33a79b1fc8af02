//! Redis store backend for multi-instance deployments.
//!
//! # Keys
//! - `rate:{user_id}`: fixed-window counter (INCR / TTL / EXPIRE)
//! - `user:{id}`: hash with `email`, `external_id`, `secret_hash`
//! - `user:external:{external_id}`: id lookup, written with SET NX
//! - `user:next_id`: id allocator

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{
    CounterStore, CredentialStore, KeyTtl, NewUser, StoreError, StoreResult, User,
};

const NEXT_ID_KEY: &str = "user:next_id";

fn user_key(id: u64) -> String {
    format!("user:{id}")
}

fn external_key(external_id: &str) -> String {
    format!("user:external:{external_id}")
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Store backed by a shared Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own after
    /// transient failures.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("Redis store connected");
        Ok(Self { conn })
    }

    async fn load_user(&self, id: u64) -> StoreResult<Option<User>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(user_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let field = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::Corrupt(format!("user {id} missing {name}")))
        };
        Ok(Some(User {
            id,
            email: field("email")?,
            external_id: field("external_id")?,
            secret_hash: field("secret_hash")?,
        }))
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let value: u64 = conn.incr(key, 1u64).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let reply: i64 = conn.ttl(key).await?;
        Ok(KeyTtl::from_redis(reply))
    }

    async fn expire(&self, key: &str, secs: u64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(key, secs as i64).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>> {
        self.load_user(id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn.clone();
        let id: Option<u64> = conn.get(external_key(external_id)).await?;
        match id {
            Some(id) => self.load_user(id).await,
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr(NEXT_ID_KEY, 1u64).await?;

        let _: () = conn
            .hset_multiple(
                user_key(id),
                &[
                    ("email", new_user.email.as_str()),
                    ("external_id", new_user.external_id.as_str()),
                    ("secret_hash", new_user.secret_hash.as_str()),
                ],
            )
            .await?;

        let claimed: bool = conn.set_nx(external_key(&new_user.external_id), id).await?;
        if claimed {
            return Ok(User {
                id,
                email: new_user.email,
                external_id: new_user.external_id,
                secret_hash: new_user.secret_hash,
            });
        }

        // Lost the race to a concurrent first login; drop our record.
        let _: () = conn.del(user_key(id)).await?;
        tracing::info!(external_id = %new_user.external_id, "Concurrent signup resolved to existing user");
        self.find_by_external_id(&new_user.external_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt("external id claimed without user".to_string()))
    }

    async fn replace_secret_hash(&self, id: u64, secret_hash: String) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(user_key(id)).await?;
        if !exists {
            return Err(StoreError::UserNotFound(id));
        }
        let _: () = conn.hset(user_key(id), "secret_hash", secret_hash).await?;
        Ok(())
    }
}
