//! Fixed-window rate limiting.
//!
//! This module provides the building blocks for admission control:
//! - [`RateLimiter`]: The core trait for admission logic.
//! - [`RateLimitLayer`]: Tower middleware that enforces the limit on `http` requests.
//! - [`Decision`]: The result of an admission check (Admitted/Denied/StoreFailure).
//!
//! # Architecture
//!
//! - **Key resolution**: `key::KeyResolver` maps a request head to a namespaced
//!   [`CounterKey`](key::CounterKey), by peer address unless overridden.
//! - **Middleware**: `RateLimitLayer` wraps your service. It doesn't know *how* limiting
//!   works, only that it should ask a `RateLimiter` and translate the answer.
//! - **Logic**: `FixedWindow` (in the `strategies` module) runs the counter protocol.
//! - **Storage**: `CounterStore` (in the `store` module) is the shared atomic counter,
//!   in-memory or Redis-backed.

use crate::error::AdmissionError;

pub mod config;
pub mod key;
pub mod middleware;
#[cfg(feature = "redis")]
pub mod redis;
pub mod response;
pub mod store;
pub mod strategies;
pub use config::{RateLimitConfig, RateLimitConfigBuilder, RateLimitSettings};
pub use key::{CounterKey, FnKey, ForwardedFor, KeyExtractor, KeyResolver, PeerAddr};
pub use middleware::{RateLimitLayer, RateLimitService};
pub use response::{ErrorHandler, Rejection, RejectionHandler};
pub use store::{CounterStore, InMemoryCounterStore, Ttl};
pub use strategies::FixedWindow;

/// The decision returned by a rate limiter for one request.
#[derive(Debug)]
pub enum Decision {
    /// The request is within quota and may proceed.
    Admitted {
        /// Post-increment count for the current window.
        count: u64,
        /// Configured `max_requests`.
        limit: u64,
    },
    /// The quota for the current window is exceeded.
    Denied {
        /// Post-increment count for the current window.
        count: u64,
        /// Configured `max_requests`.
        limit: u64,
        /// Seconds until the window expires, as reported by the store.
        /// Negative values are the store's "no expiry" (-1) or "missing key" (-2) sentinels.
        retry_after: i64,
    },
    /// The store (or identity extraction) failed; no decision was made.
    StoreFailure(AdmissionError),
}

impl Decision {
    /// Helper to check if admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }

    /// Helper to check if denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }

    /// Retry hint carried by a denial.
    pub fn retry_after(&self) -> Option<i64> {
        match self {
            Decision::Denied { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// The failure cause, if the check failed.
    pub fn failure(&self) -> Option<&AdmissionError> {
        match self {
            Decision::StoreFailure(e) => Some(e),
            _ => None,
        }
    }
}

/// Core interface for admission logic.
///
/// Decouples the middleware from the algorithm and from the storage backend.
/// Implementations never return raw errors: faults are folded into
/// [`Decision::StoreFailure`].
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Run one admission check for `key`.
    async fn check(&self, key: &key::CounterKey) -> Decision;
}
