//! Redis Counter Store
//!
//! Like/member sets and integer counters kept in Redis.
//!
//! | Operation       | Command   |
//! |-----------------|-----------|
//! | `add_member`    | SADD      |
//! | `remove_member` | SREM      |
//! | `is_member`     | SISMEMBER |
//! | `set_size`      | SCARD     |
//! | `increment`     | INCRBY    |
//! | `get`           | GET       |

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{CounterKey, CounterStore};
use crate::shared::error::AppError;

/// Redis-backed counter store.
///
/// Cloning is cheap; every clone shares the same `ConnectionManager`.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    /// Optional key prefix for namespacing
    prefix: Option<Arc<str>>,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: None }
    }

    /// All keys are prefixed, e.g. `"community:"` turns `likes:post:1`
    /// into `community:likes:post:1`.
    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
        }
    }

    fn format_key(&self, key: &CounterKey) -> String {
        format_key(self.prefix.as_deref(), key)
    }
}

fn format_key(prefix: Option<&str>, key: &CounterKey) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key.storage_key()),
        None => key.storage_key(),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    #[instrument(skip(self), level = "debug")]
    async fn add_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let added: i64 = conn.sadd(&full_key, actor.to_string()).await?;
        debug!(key = %full_key, added = added, "Set add");

        Ok(added > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let removed: i64 = conn.srem(&full_key, actor.to_string()).await?;
        debug!(key = %full_key, removed = removed, "Set remove");

        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn is_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let member: bool = conn.sismember(&full_key, actor.to_string()).await?;
        Ok(member)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_size(&self, key: &CounterKey) -> Result<i64, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let size: i64 = conn.scard(&full_key).await?;
        Ok(size)
    }

    #[instrument(skip(self), level = "debug")]
    async fn increment(&self, key: &CounterKey, delta: i64) -> Result<i64, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let value: i64 = conn.incr(&full_key, delta).await?;
        debug!(key = %full_key, delta = delta, value = value, "Counter increment");

        Ok(value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &CounterKey) -> Result<i64, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let value: Option<i64> = conn.get(&full_key).await?;
        Ok(value.unwrap_or(0))
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
