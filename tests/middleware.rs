use async_trait::async_trait;
use futures::future::Ready;
use http::header::RETRY_AFTER;
use http::request::Parts;
use http::{Request, Response, StatusCode};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, ServiceExt};
use windowguard::prelude::*;
use windowguard::rate_limit::response::{FailureBody, RejectionBody};

struct BrokenStore;

#[async_trait]
impl CounterStore for BrokenStore {
    type Error = io::Error;

    async fn increment(&self, _key: &str) -> Result<u64, io::Error> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "store unreachable"))
    }

    async fn set_expiry(&self, _key: &str, _seconds: u64) -> Result<(), io::Error> {
        Ok(())
    }

    async fn remaining_ttl(&self, _key: &str) -> Result<Ttl, io::Error> {
        Ok(Ttl::Missing)
    }
}

fn request_from(addr: &str) -> Request<String> {
    let mut req = Request::builder().uri("/protected").body(String::new()).unwrap();
    req.extensions_mut().insert(addr.parse::<SocketAddr>().unwrap());
    req
}

/// Protected handler that counts how often it actually ran.
#[derive(Clone)]
struct Counting {
    hits: Arc<AtomicUsize>,
}

impl tower::Service<Request<String>> for Counting {
    type Response = Response<String>;
    type Error = io::Error;
    type Future = Ready<Result<Response<String>, io::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<String>) -> Self::Future {
        self.hits.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(Response::new(String::from("ok"))))
    }
}

fn counting_handler(hits: Arc<AtomicUsize>) -> Counting {
    Counting { hits }
}

fn in_memory(max: u64, window: u64) -> FixedWindow<InMemoryCounterStore> {
    FixedWindow::new(InMemoryCounterStore::new(), RateLimitConfig::new(max, window).unwrap())
}

#[tokio::test]
async fn admits_within_quota_and_rejects_with_default_body() {
    let hits = Arc::new(AtomicUsize::new(0));
    let svc = RateLimitLayer::new(in_memory(5, 60)).layer(counting_handler(hits.clone()));

    for _ in 0..5 {
        let res = svc.clone().oneshot(request_from("10.0.0.1:1000")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), "ok");
    }

    let res = svc.clone().oneshot(request_from("10.0.0.1:1001")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: RejectionBody = serde_json::from_str(res.body()).unwrap();
    assert_eq!(body.status, 429);
    assert!(!body.success);
    assert_eq!(body.message, "Too many requests. Please try again later.");
    assert!((59..=60).contains(&body.retry_after));
    assert_eq!(res.headers()[RETRY_AFTER], body.retry_after.to_string().as_str());
    assert_eq!(hits.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn custom_key_fn_separates_requesters() {
    let hits = Arc::new(AtomicUsize::new(0));
    let svc = RateLimitLayer::new(in_memory(1, 60))
        .key_fn(|parts: &Parts| {
            parts.headers.get("x-user").and_then(|v| v.to_str().ok()).unwrap_or("").to_string()
        })
        .layer(counting_handler(hits.clone()));

    for user in ["alice", "bob"] {
        let mut req = request_from("10.0.0.1:1000");
        req.headers_mut().insert("x-user", user.parse().unwrap());
        let res = svc.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejection_hook_replaces_default_response() {
    let hits = Arc::new(AtomicUsize::new(0));
    let svc = RateLimitLayer::new(in_memory(1, 60))
        .on_rejected(|_: &Parts, rejection: &Rejection| {
            let mut res = Response::new(format!("quota {} used", rejection.limit));
            *res.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            res
        })
        .layer(counting_handler(hits.clone()));

    svc.clone().oneshot(request_from("10.0.0.1:1")).await.unwrap();
    let res = svc.clone().oneshot(request_from("10.0.0.1:1")).await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body(), "quota 1 used");
    assert!(res.headers().get(RETRY_AFTER).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn store_failure_yields_default_500_and_skips_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let limiter = FixedWindow::new(BrokenStore, RateLimitConfig::new(5, 60).unwrap());
    let svc = RateLimitLayer::new(limiter).layer(counting_handler(hits.clone()));

    let res = svc.oneshot(request_from("10.0.0.1:1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: FailureBody = serde_json::from_str(res.body()).unwrap();
    assert_eq!(body.status, 500);
    assert!(!body.success);
    assert_eq!(body.message, "Rate limiting failed. Please try again later.");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn error_hook_receives_cause() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_hook = seen.clone();
    let limiter = FixedWindow::new(BrokenStore, RateLimitConfig::new(5, 60).unwrap());
    let svc = RateLimitLayer::new(limiter)
        .on_error(move |_: &Parts, error: &AdmissionError| {
            *seen_hook.lock().unwrap() = error.store_op();
            let mut res = Response::new(error.to_string());
            *res.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            res
        })
        .layer(counting_handler(hits.clone()));

    let res = svc.oneshot(request_from("10.0.0.1:1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.body().contains("store unreachable"));
    assert_eq!(*seen.lock().unwrap(), Some(StoreOp::Increment));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_peer_addr_goes_through_error_path() {
    let hits = Arc::new(AtomicUsize::new(0));
    let store = InMemoryCounterStore::new();
    let limiter = FixedWindow::new(store.clone(), RateLimitConfig::new(5, 60).unwrap());
    let svc = RateLimitLayer::new(limiter).layer(counting_handler(hits.clone()));

    let req = Request::builder().uri("/").body(String::new()).unwrap();
    let res = svc.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn fallible_extractor_error_reaches_error_hook() {
    struct ApiKey;
    impl KeyExtractor for ApiKey {
        fn extract(&self, parts: &Parts) -> Result<String, KeyError> {
            parts
                .headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| KeyError::Custom("missing x-api-key".into()))
        }
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let svc = RateLimitLayer::new(in_memory(5, 60))
        .key_extractor(ApiKey)
        .on_error(|_: &Parts, error: &AdmissionError| {
            let mut res = Response::new(error.to_string());
            *res.status_mut() = if error.is_key() {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            res
        })
        .layer(counting_handler(hits.clone()));

    let res = svc.clone().oneshot(request_from("10.0.0.1:1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let mut req = request_from("10.0.0.1:1");
    req.headers_mut().insert("x-api-key", "k-1".parse().unwrap());
    let res = svc.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn key_prefix_namespaces_store_keys() {
    let store = InMemoryCounterStore::new();
    let limiter = FixedWindow::new(store.clone(), RateLimitConfig::new(5, 60).unwrap());
    let svc = RateLimitLayer::new(limiter)
        .key_prefix("api:")
        .layer(counting_handler(Arc::new(AtomicUsize::new(0))));

    svc.oneshot(request_from("192.0.2.9:80")).await.unwrap();
    assert_eq!(store.count("api:192.0.2.9"), Some(1));
    assert_eq!(store.count("rate:192.0.2.9"), None);
}
