//! Convenient re-exports for common windowguard types.
pub use crate::{
    error::{AdmissionError, ConfigError, KeyError, StoreOp},
    rate_limit::{
        key::{FnKey, ForwardedFor, KeyExtractor, PeerAddr},
        response::{ErrorHandler, Rejection, RejectionHandler},
        CounterStore, Decision, FixedWindow, InMemoryCounterStore, RateLimitConfig,
        RateLimitLayer, RateLimitSettings, RateLimiter, Ttl,
    },
    telemetry::{LogSink, MemorySink, NullSink, RateLimitEvent, TelemetrySink},
};
