use crate::error::{AdmissionError, StoreOp};
use crate::rate_limit::config::RateLimitConfig;
use crate::rate_limit::key::CounterKey;
use crate::rate_limit::store::CounterStore;
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::{emit_best_effort, NullSink, RateLimitEvent, TelemetrySink};
use async_trait::async_trait;
use std::sync::Arc;

/// A fixed-window counter rate limiter.
///
/// Per request: atomically increment the key; if this increment created the window
/// (`count == 1`) set its expiry; if `count > max_requests` read the remaining TTL and
/// deny. Any store fault short-circuits into [`Decision::StoreFailure`].
///
/// Known trade-offs:
/// - up to `2 * max_requests` requests can pass across a window boundary;
/// - increment and expiry are separate round-trips, so a crash between them leaves a
///   key without expiry that keeps counting until removed.
pub struct FixedWindow<S, T = NullSink> {
    store: Arc<S>,
    config: RateLimitConfig,
    sink: T,
}

impl<S> FixedWindow<S, NullSink>
where
    S: CounterStore + 'static,
{
    /// Create a limiter backed by `store`.
    pub fn new(store: S, config: RateLimitConfig) -> Self {
        Self { store: Arc::new(store), config, sink: NullSink }
    }
}

impl<S, T> FixedWindow<S, T>
where
    S: CounterStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Attach a telemetry sink.
    pub fn with_sink<U>(self, sink: U) -> FixedWindow<S, U>
    where
        U: TelemetrySink,
    {
        FixedWindow { store: self.store, config: self.config, sink }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn emit(&self, event: RateLimitEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    async fn evaluate(&self, key: &CounterKey) -> Result<Decision, AdmissionError> {
        let limit = self.config.max_requests();
        let count = self
            .store
            .increment(key.as_str())
            .await
            .map_err(|e| AdmissionError::store(StoreOp::Increment, e))?;

        if count == 1 {
            let window_secs = self.config.window_in_seconds();
            self.store
                .set_expiry(key.as_str(), window_secs)
                .await
                .map_err(|e| AdmissionError::store(StoreOp::SetExpiry, e))?;
            let window = self.config.window();
            tracing::debug!(key = %key, window = ?window, "rate limit window opened");
            self.emit(RateLimitEvent::WindowOpened { key: key.to_string(), window_secs }).await;
        }

        if count > limit {
            let retry_after = self
                .store
                .remaining_ttl(key.as_str())
                .await
                .map_err(|e| AdmissionError::store(StoreOp::RemainingTtl, e))?
                .as_secs();
            tracing::debug!(key = %key, count, limit, retry_after, "rate limit exceeded");
            self.emit(RateLimitEvent::Denied { key: key.to_string(), count, limit, retry_after })
                .await;
            return Ok(Decision::Denied { count, limit, retry_after });
        }

        if self.config.debug() {
            tracing::info!(key = %key, count, limit, "rate limit check passed");
        }
        self.emit(RateLimitEvent::Admitted { key: key.to_string(), count, limit }).await;
        Ok(Decision::Admitted { count, limit })
    }
}

#[async_trait]
impl<S, T> RateLimiter for FixedWindow<S, T>
where
    S: CounterStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    async fn check(&self, key: &CounterKey) -> Decision {
        match self.evaluate(key).await {
            Ok(decision) => decision,
            Err(error) => {
                if let AdmissionError::Store { op, source } = &error {
                    self.emit(RateLimitEvent::StoreFailed {
                        key: key.to_string(),
                        op: *op,
                        error: source.to_string(),
                    })
                    .await;
                }
                Decision::StoreFailure(error)
            }
        }
    }
}

impl<S, T> std::fmt::Debug for FixedWindow<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindow").field("config", &self.config).finish_non_exhaustive()
    }
}
