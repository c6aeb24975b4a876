//! Telemetry for admission decisions.
//!
//! The fixed-window limiter emits a [`RateLimitEvent`] for every outcome of the counter
//! protocol. Events flow through `TelemetrySink` implementations which can log,
//! aggregate, or forward them to external systems.
//!
//! # Event Types
//!
//! - `WindowOpened`: the first increment created a new window and its expiry was set
//! - `Admitted`: the request is within quota
//! - `Denied`: the quota is exceeded; carries the retry hint
//! - `StoreFailed`: the counter store failed and no decision was made
//!
//! # Telemetry Sinks
//!
//! The `TelemetrySink` trait is a `tower::Service<RateLimitEvent>`, so sinks compose
//! with standard tower combinators.
//!
//! ```rust
//! use windowguard::telemetry::{MemorySink, RateLimitEvent};
//! use tower::Service;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut sink = MemorySink::new();
//! let event = RateLimitEvent::Admitted { key: "rate:10.0.0.1".into(), count: 1, limit: 5 };
//! sink.call(event.clone()).await.unwrap();
//! assert_eq!(sink.events(), vec![event]);
//! # }
//! ```

use crate::error::StoreOp;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A telemetry sink that consumes rate limit events.
pub trait TelemetrySink:
    Service<RateLimitEvent, Response = (), Error = Self::SinkError> + Clone + Send + Sync + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Telemetry never affects an admission decision: if a sink is not ready or returns an
/// error, the event is dropped.
pub async fn emit_best_effort<S>(sink: S, event: RateLimitEvent)
where
    S: Service<RateLimitEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// Events emitted while running the fixed-window protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitEvent {
    /// The increment created a new window and its expiry was set.
    WindowOpened {
        key: String,
        window_secs: u64,
    },
    /// The request is within quota.
    Admitted {
        key: String,
        count: u64,
        limit: u64,
    },
    /// The quota is exceeded.
    Denied {
        key: String,
        count: u64,
        limit: u64,
        /// Raw retry hint as reported by the store (may be a negative sentinel).
        retry_after: i64,
    },
    /// The counter store failed.
    StoreFailed {
        key: String,
        op: StoreOp,
        error: String,
    },
}

impl fmt::Display for RateLimitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitEvent::WindowOpened { key, window_secs } => {
                write!(f, "WindowOpened({}, window={}s)", key, window_secs)
            }
            RateLimitEvent::Admitted { key, count, limit } => {
                write!(f, "Admitted({}, {}/{})", key, count, limit)
            }
            RateLimitEvent::Denied { key, count, limit, retry_after } => {
                write!(f, "Denied({}, {}/{}, retry_after={}s)", key, count, limit, retry_after)
            }
            RateLimitEvent::StoreFailed { key, op, error } => {
                write!(f, "StoreFailed({}, op={}, error={})", key, op, error)
            }
        }
    }
}

/// A no-op telemetry sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<RateLimitEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: RateLimitEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A telemetry sink that logs events using the `tracing` crate.
///
/// Events are logged at INFO level with structured fields.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<RateLimitEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RateLimitEvent) -> Self::Future {
        tracing::info!(event = %event, "rate_limit_event");
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A telemetry sink that stores events in memory.
///
/// Useful for testing and debugging. Oldest events are evicted once `capacity` is reached.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<RateLimitEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    /// Creates a bounded memory sink (default cap: 10,000).
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Creates a bounded memory sink with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<RateLimitEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a snapshot of all events received so far.
    pub fn events(&self) -> Vec<RateLimitEvent> {
        self.guard().clone()
    }

    /// Clears all stored events.
    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Returns the number of events stored.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Returns true if no events are stored.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Returns the number of evicted events.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<RateLimitEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RateLimitEvent) -> Self::Future {
        let mut guard = self.guard();
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}
