//! Integration tests for the Redis counter store.
//!
//! These tests require a Redis instance running at `redis://127.0.0.1/`.
//! Tests are ignored by default - run with `cargo test --features redis --test redis_store -- --ignored`

#![cfg(feature = "redis")]

use windowguard::rate_limit::redis::RedisCounterStore;
use windowguard::rate_limit::{CounterKey, CounterStore, FixedWindow, RateLimiter, Ttl};
use windowguard::{ConfigError, RateLimitConfig, RateLimitSettings};

const URL: &str = "redis://127.0.0.1/";

async fn redis_available() -> bool {
    RedisCounterStore::connect(URL).await.is_ok()
}

/// Unique key per test run so reruns don't see stale windows.
fn fresh_key(test_name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("windowguard-test:{}:{}", test_name, nanos)
}

#[tokio::test]
async fn blank_url_is_a_setup_fault() {
    assert!(matches!(RedisCounterStore::connect("  ").await, Err(ConfigError::MissingStoreUrl)));
    let settings = RateLimitSettings::default();
    assert!(matches!(
        RedisCounterStore::from_settings(&settings).await,
        Err(ConfigError::MissingStoreUrl)
    ));
}

#[tokio::test]
#[ignore] // Requires Redis
async fn increment_expire_ttl() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at {}", URL);
        return;
    }
    let store = RedisCounterStore::connect(URL).await.unwrap();
    let key = fresh_key("commands");

    assert_eq!(store.remaining_ttl(&key).await.unwrap(), Ttl::Missing);
    assert_eq!(store.increment(&key).await.unwrap(), 1);
    assert_eq!(store.remaining_ttl(&key).await.unwrap(), Ttl::NoExpiry);
    store.set_expiry(&key, 30).await.unwrap();
    assert_eq!(store.increment(&key).await.unwrap(), 2);
    match store.remaining_ttl(&key).await.unwrap() {
        Ttl::Expires(secs) => assert!((29..=30).contains(&secs)),
        other => panic!("expected expiring key, got {:?}", other),
    }
}

#[tokio::test]
#[ignore] // Requires Redis
async fn fixed_window_against_redis() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }
    let store = RedisCounterStore::connect(URL).await.unwrap();
    let limiter = FixedWindow::new(store, RateLimitConfig::new(2, 60).unwrap());
    let key = CounterKey::new("rate:", &fresh_key("window"));

    assert!(limiter.check(&key).await.is_admitted());
    assert!(limiter.check(&key).await.is_admitted());
    let retry = limiter.check(&key).await.retry_after().unwrap();
    assert!((59..=60).contains(&retry));
}
