//! Error types for admission control.
//!
//! Two families live here:
//! - [`ConfigError`]: setup faults, returned synchronously while building a limiter or store.
//! - [`AdmissionError`]: faults during a single admission check. These are never returned
//!   from the middleware; they travel inside [`Decision::StoreFailure`](crate::Decision) and
//!   are resolved into an error-hook response or the default 500 body.
use std::fmt;
use thiserror::Error;

/// Boxed error used for counter store failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Setup-time configuration fault.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_requests` was never supplied.
    #[error("max_requests is required")]
    MissingMaxRequests,
    /// `window_in_seconds` was never supplied.
    #[error("window_in_seconds is required")]
    MissingWindow,
    /// `max_requests` must be >= 1.
    #[error("max_requests must be >= 1 (got {0})")]
    InvalidMaxRequests(u64),
    /// `window_in_seconds` must be >= 1.
    #[error("window_in_seconds must be >= 1 (got {0})")]
    InvalidWindow(u64),
    /// No counter store coordinates were supplied.
    #[error("counter store URL is required")]
    MissingStoreUrl,
    /// The counter store client could not be created.
    #[error("failed to open counter store: {0}")]
    StoreConnect(#[source] BoxError),
}

/// Counter store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Increment,
    SetExpiry,
    RemainingTtl,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Increment => write!(f, "increment"),
            StoreOp::SetExpiry => write!(f, "set_expiry"),
            StoreOp::RemainingTtl => write!(f, "remaining_ttl"),
        }
    }
}

/// Failure to derive a requester identity.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The hosting server did not attach the peer `SocketAddr` to the request extensions.
    #[error("request carries no peer address")]
    MissingPeerAddr,
    /// A custom extractor rejected the request.
    #[error("identity extraction failed: {0}")]
    Custom(String),
}

/// Fault raised while running one admission check.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The counter store failed.
    #[error("counter store {op} failed: {source}")]
    Store {
        op: StoreOp,
        #[source]
        source: BoxError,
    },
    /// The requester identity could not be derived.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl AdmissionError {
    /// Wrap a store error raised by `op`.
    pub fn store<E>(op: StoreOp, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        AdmissionError::Store { op, source: source.into() }
    }

    /// The failed store operation, if this is a store fault.
    pub fn store_op(&self) -> Option<StoreOp> {
        match self {
            AdmissionError::Store { op, .. } => Some(*op),
            AdmissionError::Key(_) => None,
        }
    }

    /// Check if this error came from identity extraction.
    pub fn is_key(&self) -> bool {
        matches!(self, AdmissionError::Key(_))
    }
}
