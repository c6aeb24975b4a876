//! Requester identity and counter keys.
//!
//! A [`KeyExtractor`] maps a request head to a raw identity string. [`KeyResolver`] then
//! namespaces it into the [`CounterKey`] used against the store. Extraction is pure:
//! the same request head always yields the same key.

use crate::error::KeyError;
use http::request::Parts;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Namespace prepended to every raw identity.
pub const DEFAULT_KEY_PREFIX: &str = "rate:";

/// Namespaced identity used to look up a requester's window in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    pub fn new(prefix: &str, raw: &str) -> Self {
        let mut key = String::with_capacity(prefix.len() + raw.len());
        key.push_str(prefix);
        key.push_str(raw);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives a raw requester identity from a request head.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, parts: &Parts) -> Result<String, KeyError>;
}

/// Identity = peer IP address.
///
/// Reads the `SocketAddr` the hosting server inserted into the request extensions
/// (`req.extensions_mut().insert(remote_addr)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddr;

impl KeyExtractor for PeerAddr {
    fn extract(&self, parts: &Parts) -> Result<String, KeyError> {
        parts
            .extensions
            .get::<SocketAddr>()
            .map(|addr| addr.ip().to_string())
            .ok_or(KeyError::MissingPeerAddr)
    }
}

/// Identity = first hop of `X-Forwarded-For`, falling back to [`PeerAddr`].
///
/// Only trust this behind a proxy that overwrites the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedFor;

impl KeyExtractor for ForwardedFor {
    fn extract(&self, parts: &Parts) -> Result<String, KeyError> {
        let first_hop = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        match first_hop {
            Some(hop) => Ok(hop.to_string()),
            None => PeerAddr.extract(parts),
        }
    }
}

/// Adapts an infallible closure into a [`KeyExtractor`]. The closure's return value is
/// used verbatim as the raw identity.
#[derive(Clone)]
pub struct FnKey<F>(pub F);

impl<F> KeyExtractor for FnKey<F>
where
    F: Fn(&Parts) -> String + Send + Sync,
{
    fn extract(&self, parts: &Parts) -> Result<String, KeyError> {
        Ok((self.0)(parts))
    }
}

impl<F> fmt::Debug for FnKey<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnKey(..)")
    }
}

/// Extractor plus namespace prefix.
#[derive(Clone)]
pub struct KeyResolver {
    extractor: Arc<dyn KeyExtractor>,
    prefix: String,
}

impl KeyResolver {
    pub fn new<K>(extractor: K) -> Self
    where
        K: KeyExtractor + 'static,
    {
        Self { extractor: Arc::new(extractor), prefix: DEFAULT_KEY_PREFIX.to_string() }
    }

    /// Replace the namespace prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replace the extractor, keeping the prefix.
    pub fn with_extractor<K>(mut self, extractor: K) -> Self
    where
        K: KeyExtractor + 'static,
    {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn resolve(&self, parts: &Parts) -> Result<CounterKey, KeyError> {
        let raw = self.extractor.extract(parts)?;
        Ok(CounterKey::new(&self.prefix, &raw))
    }
}

impl Default for KeyResolver {
    fn default() -> Self {
        Self::new(PeerAddr)
    }
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResolver").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}
