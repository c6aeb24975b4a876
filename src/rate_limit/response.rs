//! Rejection and failure responses.
//!
//! A denial or store failure never reaches the protected service. The response sent in
//! its place comes either from a caller hook ([`RejectionHandler`], [`ErrorHandler`]),
//! which fully owns status, headers and body, or from the defaults below.

use crate::error::AdmissionError;
use crate::rate_limit::key::CounterKey;
use http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http::request::Parts;
use http::{Response, StatusCode};
use serde::{Deserialize, Serialize};

pub const REJECTION_MESSAGE: &str = "Too many requests. Please try again later.";
pub const FAILURE_MESSAGE: &str = "Rate limiting failed. Please try again later.";

/// Details of a denied request, handed to rejection hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub key: CounterKey,
    pub count: u64,
    pub limit: u64,
    /// Seconds until the window resets, or a negative store sentinel.
    pub retry_after: i64,
}

/// Default 429 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    pub status: u16,
    pub success: bool,
    pub message: String,
    pub retry_after: i64,
}

/// Default 500 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    pub status: u16,
    pub success: bool,
    pub message: String,
}

/// Builds the response for a denied request.
pub trait RejectionHandler: Send + Sync {
    fn on_rejected(&self, parts: &Parts, rejection: &Rejection) -> Response<String>;
}

impl<F> RejectionHandler for F
where
    F: Fn(&Parts, &Rejection) -> Response<String> + Send + Sync,
{
    fn on_rejected(&self, parts: &Parts, rejection: &Rejection) -> Response<String> {
        self(parts, rejection)
    }
}

/// Builds the response when the admission check itself failed.
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, parts: &Parts, error: &AdmissionError) -> Response<String>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Parts, &AdmissionError) -> Response<String> + Send + Sync,
{
    fn on_error(&self, parts: &Parts, error: &AdmissionError) -> Response<String> {
        self(parts, error)
    }
}

fn json_response<B: Serialize>(status: StatusCode, body: &B) -> Response<String> {
    let mut res = Response::new(serde_json::to_string(body).unwrap_or_default());
    *res.status_mut() = status;
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

/// Default 429 response.
///
/// The body carries the raw retry hint (sentinels included); the `Retry-After` header is
/// clamped to 0 since HTTP delta-seconds cannot be negative.
pub fn default_rejection(rejection: &Rejection) -> Response<String> {
    let body = RejectionBody {
        status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        success: false,
        message: REJECTION_MESSAGE.to_string(),
        retry_after: rejection.retry_after,
    };
    let mut res = json_response(StatusCode::TOO_MANY_REQUESTS, &body);
    let header_secs = u64::try_from(rejection.retry_after).unwrap_or(0);
    res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(header_secs));
    res
}

/// Default 500 response.
pub fn default_failure() -> Response<String> {
    let body = FailureBody {
        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        success: false,
        message: FAILURE_MESSAGE.to_string(),
    };
    json_response(StatusCode::INTERNAL_SERVER_ERROR, &body)
}
