//! Redis-backed counter store.
//!
//! Maps the three store operations onto single Redis commands:
//! - `increment` → `INCR key`
//! - `set_expiry` → `EXPIRE key seconds`
//! - `remaining_ttl` → `TTL key` (`-1` no expiry, `-2` missing)
//!
//! `INCR` is atomic on the server, so every process sharing the Redis instance observes a
//! distinct post-increment value. The commands are not pipelined into a transaction.
//!
//! ## Example
//!
//! ```rust,ignore
//! use windowguard::{FixedWindow, RateLimitLayer, RateLimitSettings};
//! use windowguard::rate_limit::redis::RedisCounterStore;
//!
//! let settings: RateLimitSettings = serde_json::from_str(raw)?;
//! let store = RedisCounterStore::from_settings(&settings).await?;
//! let limiter = FixedWindow::new(store, settings.config()?);
//! let layer = RateLimitLayer::new(limiter);
//! ```

use crate::error::ConfigError;
use crate::rate_limit::config::RateLimitSettings;
use crate::rate_limit::store::{CounterStore, Ttl};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;

/// Counter store shared through a Redis server.
///
/// Clones share one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect to Redis.
    ///
    /// # Errors
    /// [`ConfigError::MissingStoreUrl`] for a blank URL, [`ConfigError::StoreConnect`] if
    /// the URL is malformed or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingStoreUrl);
        }
        let client = Client::open(url).map_err(|e| ConfigError::StoreConnect(e.into()))?;
        let connection =
            ConnectionManager::new(client).await.map_err(|e| ConfigError::StoreConnect(e.into()))?;
        Ok(Self { connection })
    }

    /// Connect using `settings.store_url`.
    pub async fn from_settings(settings: &RateLimitSettings) -> Result<Self, ConfigError> {
        Self::connect(settings.store_url()?).await
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    type Error = RedisError;

    async fn increment(&self, key: &str) -> Result<u64, RedisError> {
        let mut conn = self.connection.clone();
        conn.incr(key, 1u64).await
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), RedisError> {
        let mut conn = self.connection.clone();
        let secs = i64::try_from(seconds).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(key, secs).await
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Ttl, RedisError> {
        let mut conn = self.connection.clone();
        let raw: i64 = conn.ttl(key).await?;
        Ok(Ttl::from_raw(raw))
    }
}
