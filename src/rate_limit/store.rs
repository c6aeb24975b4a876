use crate::clock::{Clock, MonotonicClock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Remaining lifetime of a counter, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Seconds until the key expires.
    Expires(u64),
    /// The key exists but has no expiry.
    NoExpiry,
    /// The key does not exist.
    Missing,
}

impl Ttl {
    /// Raw sentinel for [`Ttl::NoExpiry`].
    pub const NO_EXPIRY: i64 = -1;
    /// Raw sentinel for [`Ttl::Missing`].
    pub const MISSING: i64 = -2;

    /// Decode a Redis-style `TTL` reply.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            Self::NO_EXPIRY => Ttl::NoExpiry,
            secs if secs >= 0 => Ttl::Expires(secs as u64),
            _ => Ttl::Missing,
        }
    }

    /// Seconds until expiry, or the raw negative sentinel.
    pub fn as_secs(&self) -> i64 {
        match self {
            Ttl::Expires(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
            Ttl::NoExpiry => Self::NO_EXPIRY,
            Ttl::Missing => Self::MISSING,
        }
    }
}

/// Abstract atomic counter store shared by every request-handling process.
///
/// Implementations must make `increment` atomic: concurrent callers on the same key are
/// serialized and each observes a distinct post-increment value.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Atomically add one to `key` and return the new value. Absent keys start at 0.
    async fn increment(&self, key: &str) -> Result<u64, Self::Error>;

    /// Expire `key` after `seconds`. Benign if the key does not exist.
    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), Self::Error>;

    /// Time left before `key` expires.
    async fn remaining_ttl(&self, key: &str) -> Result<Ttl, Self::Error>;
}

/// Mutating calls between two purges of expired windows.
const SWEEP_EVERY: u64 = 1_024;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at_millis: Option<u64>,
}

impl Counter {
    const FRESH: Counter = Counter { count: 0, expires_at_millis: None };

    fn is_live(&self, now: u64) -> bool {
        !matches!(self.expires_at_millis, Some(at) if at <= now)
    }
}

/// In-memory counter store with Redis `INCR`/`EXPIRE`/`TTL` semantics.
///
/// Clones share the same map. Suitable for tests and single-process deployments only:
/// the whole point of the store seam is that production limits are shared.
///
/// Expiry is checked on the entry being accessed, so an expired window reads as absent
/// immediately. Dead entries are purged in bulk once every `SWEEP_EVERY` increments.
#[derive(Clone, Debug)]
pub struct InMemoryCounterStore {
    data: Arc<Mutex<HashMap<String, Counter>>>,
    increments: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self {
            data: Arc::default(),
            increments: Arc::default(),
            clock: Arc::new(MonotonicClock::default()),
        }
    }
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Current count for `key`, if a live window exists.
    pub fn count(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_millis();
        self.guard().get(key).filter(|c| c.is_live(now)).map(|c| c.count)
    }

    /// Number of live keys. Walks the whole map.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.guard().values().filter(|c| c.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Counter>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    type Error = std::convert::Infallible;

    async fn increment(&self, key: &str) -> Result<u64, Self::Error> {
        let now = self.clock.now_millis();
        let mut guard = self.guard();
        if self.increments.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            guard.retain(|_, c| c.is_live(now));
        }
        let counter = guard.entry(key.to_string()).or_insert(Counter::FRESH);
        if !counter.is_live(now) {
            *counter = Counter::FRESH;
        }
        counter.count = counter.count.saturating_add(1);
        Ok(counter.count)
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), Self::Error> {
        let now = self.clock.now_millis();
        let mut guard = self.guard();
        let expired = match guard.get_mut(key) {
            Some(counter) if counter.is_live(now) => {
                counter.expires_at_millis =
                    Some(now.saturating_add(seconds.saturating_mul(1_000)));
                false
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.remove(key);
        }
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Ttl, Self::Error> {
        let now = self.clock.now_millis();
        let guard = self.guard();
        Ok(match guard.get(key).filter(|c| c.is_live(now)) {
            None => Ttl::Missing,
            Some(Counter { expires_at_millis: None, .. }) => Ttl::NoExpiry,
            // Round up so a live window never reports 0.
            Some(Counter { expires_at_millis: Some(at), .. }) => {
                Ttl::Expires((at - now + 999) / 1_000)
            }
        })
    }
}
