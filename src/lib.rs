#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # windowguard
//!
//! Fixed-window request admission control for tower services.
//!
//! Each request is mapped to a requester identity, counted against a shared atomic
//! counter store, and either forwarded or answered with a rejection. Because the count
//! lives in the store (Redis in production), the limit holds across every process that
//! shares it.
//!
//! ## Features
//!
//! - **Fixed-window counter** over `INCR`/`EXPIRE`/`TTL` semantics
//! - **Pluggable identity**: peer address by default, closures or custom extractors
//! - **Hooks** that fully own the denial and failure responses
//! - **No guessing on store failure**: the caller decides fail-open or fail-closed
//! - **Telemetry** events through tower-based sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use windowguard::{FixedWindow, InMemoryCounterStore, RateLimitConfig, RateLimitLayer};
//! use http::{Request, Response, StatusCode};
//! use std::net::SocketAddr;
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let limiter = FixedWindow::new(InMemoryCounterStore::new(), RateLimitConfig::new(1, 60).unwrap());
//! let svc = ServiceBuilder::new()
//!     .layer(RateLimitLayer::new(limiter))
//!     .service(service_fn(|_req: Request<String>| async {
//!         Ok::<_, std::convert::Infallible>(Response::new(String::from("hello")))
//!     }));
//!
//! let request = || {
//!     let mut req = Request::new(String::new());
//!     req.extensions_mut().insert("10.0.0.1:4000".parse::<SocketAddr>().unwrap());
//!     req
//! };
//! let first = svc.clone().oneshot(request()).await.unwrap();
//! assert_eq!(first.status(), StatusCode::OK);
//! let second = svc.clone().oneshot(request()).await.unwrap();
//! assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
//! # }
//! ```

pub mod clock;
pub mod error;
pub mod prelude;
pub mod rate_limit;
pub mod telemetry;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{AdmissionError, BoxError, ConfigError, KeyError, StoreOp};
pub use rate_limit::{
    CounterKey, CounterStore, Decision, ErrorHandler, FixedWindow, InMemoryCounterStore,
    RateLimitConfig, RateLimitLayer, RateLimitService, RateLimitSettings, RateLimiter, Rejection,
    RejectionHandler, Ttl,
};
