use crate::error::AdmissionError;
use crate::rate_limit::key::{FnKey, KeyExtractor, KeyResolver};
use crate::rate_limit::response::{self, ErrorHandler, Rejection, RejectionHandler};
use crate::rate_limit::{Decision, RateLimiter};
use futures::future::BoxFuture;
use http::request::Parts;
use http::{Request, Response};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that admits or rejects `http` requests using a [`RateLimiter`].
///
/// ```
/// use windowguard::{FixedWindow, InMemoryCounterStore, RateLimitConfig, RateLimitLayer};
///
/// let limiter = FixedWindow::new(InMemoryCounterStore::new(), RateLimitConfig::new(5, 60).unwrap());
/// let layer = RateLimitLayer::new(limiter)
///     .key_fn(|parts: &http::request::Parts| parts.uri.path().to_string());
/// # let _ = layer;
/// ```
pub struct RateLimitLayer<L> {
    limiter: Arc<L>,
    resolver: KeyResolver,
    on_rejected: Option<Arc<dyn RejectionHandler>>,
    on_error: Option<Arc<dyn ErrorHandler>>,
}

impl<L> RateLimitLayer<L> {
    /// Create a rate limit layer keyed by peer address.
    pub fn new(limiter: L) -> Self {
        Self {
            limiter: Arc::new(limiter),
            resolver: KeyResolver::default(),
            on_rejected: None,
            on_error: None,
        }
    }

    /// Derive the raw identity with `f` instead of the peer address.
    pub fn key_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Parts) -> String + Send + Sync + 'static,
    {
        self.key_extractor(FnKey(f))
    }

    /// Derive the raw identity with a fallible extractor.
    pub fn key_extractor<K>(mut self, extractor: K) -> Self
    where
        K: KeyExtractor + 'static,
    {
        self.resolver = self.resolver.with_extractor(extractor);
        self
    }

    /// Replace the `"rate:"` namespace.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resolver = self.resolver.with_prefix(prefix);
        self
    }

    /// Build denial responses with `handler` instead of the default 429.
    pub fn on_rejected<H>(mut self, handler: H) -> Self
    where
        H: RejectionHandler + 'static,
    {
        self.on_rejected = Some(Arc::new(handler));
        self
    }

    /// Build failure responses with `handler` instead of the default 500.
    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: ErrorHandler + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    fn reject(&self, parts: &Parts, rejection: &Rejection) -> Response<String> {
        match &self.on_rejected {
            Some(hook) => hook.on_rejected(parts, rejection),
            None => response::default_rejection(rejection),
        }
    }

    fn fail(&self, parts: &Parts, error: &AdmissionError) -> Response<String> {
        match &self.on_error {
            Some(hook) => hook.on_error(parts, error),
            None => response::default_failure(),
        }
    }
}

impl<L> Clone for RateLimitLayer<L> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
            on_rejected: self.on_rejected.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<L: fmt::Debug> fmt::Debug for RateLimitLayer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLayer")
            .field("limiter", &self.limiter)
            .field("resolver", &self.resolver)
            .field("on_rejected", &self.on_rejected.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<S, L> Layer<S> for RateLimitLayer<L>
where
    L: RateLimiter + 'static,
{
    type Service = RateLimitService<S, L>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService { inner: service, layer: self.clone() }
    }
}

/// Middleware service that enforces rate limits.
#[derive(Debug)]
pub struct RateLimitService<S, L> {
    inner: S,
    layer: RateLimitLayer<L>,
}

impl<S: Clone, L> Clone for RateLimitService<S, L> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), layer: self.layer.clone() }
    }
}

impl<S, L, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<S, L>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: RateLimiter + 'static,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Keep the service that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let layer = self.layer.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let key = match layer.resolver.resolve(&parts) {
                Ok(key) => key,
                Err(e) => {
                    let error = AdmissionError::from(e);
                    tracing::warn!(error = %error, "rate limit key extraction failed");
                    return Ok(layer.fail(&parts, &error).map(ResBody::from));
                }
            };

            match layer.limiter.check(&key).await {
                Decision::Admitted { .. } => inner.call(Request::from_parts(parts, body)).await,
                Decision::Denied { count, limit, retry_after } => {
                    let rejection = Rejection { key, count, limit, retry_after };
                    Ok(layer.reject(&parts, &rejection).map(ResBody::from))
                }
                Decision::StoreFailure(error) => {
                    tracing::warn!(key = %key, error = %error, "rate limit check failed");
                    Ok(layer.fail(&parts, &error).map(ResBody::from))
                }
            }
        })
    }
}
