//! Validated limiter configuration.
//!
//! `max_requests` and `window_in_seconds` are both required and must be >= 1. Missing or
//! zero values are rejected when the config is built, never on the first request.

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Immutable fixed-window configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    max_requests: u64,
    window_in_seconds: u64,
    debug: bool,
}

impl RateLimitConfig {
    /// Create a config with validation.
    ///
    /// # Examples
    /// ```
    /// use windowguard::RateLimitConfig;
    /// let cfg = RateLimitConfig::new(5, 60).unwrap();
    /// assert_eq!(cfg.max_requests(), 5);
    /// assert!(RateLimitConfig::new(0, 60).is_err());
    /// ```
    pub fn new(max_requests: u64, window_in_seconds: u64) -> Result<Self, ConfigError> {
        Self::builder().max_requests(max_requests).window_in_seconds(window_in_seconds).build()
    }

    /// Start a builder with no required values set.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::default()
    }

    /// Requests admitted per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Window length in whole seconds.
    pub fn window_in_seconds(&self) -> u64 {
        self.window_in_seconds
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_in_seconds)
    }

    /// Whether admitted requests emit a diagnostic log line.
    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Builder for [`RateLimitConfig`].
#[derive(Debug, Clone, Default)]
pub struct RateLimitConfigBuilder {
    max_requests: Option<u64>,
    window_in_seconds: Option<u64>,
    debug: bool,
}

impl RateLimitConfigBuilder {
    /// Requests admitted per window. Required, must be >= 1.
    pub fn max_requests(mut self, max: u64) -> Self {
        self.max_requests = Some(max);
        self
    }

    /// Window length in seconds. Required, must be >= 1.
    pub fn window_in_seconds(mut self, secs: u64) -> Self {
        self.window_in_seconds = Some(secs);
        self
    }

    /// Log key, count, and limit for every admitted request.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Build the config, validating inputs.
    pub fn build(self) -> Result<RateLimitConfig, ConfigError> {
        let max_requests = self.max_requests.ok_or(ConfigError::MissingMaxRequests)?;
        let window_in_seconds = self.window_in_seconds.ok_or(ConfigError::MissingWindow)?;
        if max_requests == 0 {
            return Err(ConfigError::InvalidMaxRequests(max_requests));
        }
        if window_in_seconds == 0 {
            return Err(ConfigError::InvalidWindow(window_in_seconds));
        }
        Ok(RateLimitConfig { max_requests, window_in_seconds, debug: self.debug })
    }
}

/// Caller-facing settings, deserializable from any serde source.
///
/// ```
/// use windowguard::RateLimitSettings;
/// let settings: RateLimitSettings = serde_json::from_str(
///     r#"{"store_url":"redis://127.0.0.1/","max_requests":5,"window_in_seconds":60}"#,
/// ).unwrap();
/// let cfg = settings.config().unwrap();
/// assert_eq!(cfg.window_in_seconds(), 60);
/// assert_eq!(settings.store_url().unwrap(), "redis://127.0.0.1/");
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitSettings {
    /// Counter store connection URL (credentials included).
    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub max_requests: Option<u64>,
    #[serde(default)]
    pub window_in_seconds: Option<u64>,
    #[serde(default)]
    pub debug: bool,
}

impl RateLimitSettings {
    /// Validate the limiter portion of the settings.
    pub fn config(&self) -> Result<RateLimitConfig, ConfigError> {
        let mut builder = RateLimitConfig::builder().debug(self.debug);
        if let Some(max) = self.max_requests {
            builder = builder.max_requests(max);
        }
        if let Some(secs) = self.window_in_seconds {
            builder = builder.window_in_seconds(secs);
        }
        builder.build()
    }

    /// The store URL; blank or absent is a setup fault.
    pub fn store_url(&self) -> Result<&str, ConfigError> {
        match self.store_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ConfigError::MissingStoreUrl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_both_values() {
        let err = RateLimitConfig::builder().window_in_seconds(60).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingMaxRequests));

        let err = RateLimitConfig::builder().max_requests(5).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingWindow));
    }

    #[test]
    fn zero_values_rejected() {
        assert!(matches!(RateLimitConfig::new(0, 60), Err(ConfigError::InvalidMaxRequests(0))));
        assert!(matches!(RateLimitConfig::new(5, 0), Err(ConfigError::InvalidWindow(0))));
    }

    #[test]
    fn builder_carries_debug_flag() {
        let cfg = RateLimitConfig::builder()
            .max_requests(1)
            .window_in_seconds(1)
            .debug(true)
            .build()
            .unwrap();
        assert!(cfg.debug());
        assert_eq!(cfg.window(), Duration::from_secs(1));
    }

    #[test]
    fn settings_without_store_url_is_setup_fault() {
        let settings: RateLimitSettings =
            serde_json::from_str(r#"{"max_requests":5,"window_in_seconds":60}"#).unwrap();
        assert!(settings.config().is_ok());
        assert!(matches!(settings.store_url(), Err(ConfigError::MissingStoreUrl)));

        let blank = RateLimitSettings { store_url: Some("  ".into()), ..settings };
        assert!(matches!(blank.store_url(), Err(ConfigError::MissingStoreUrl)));
    }

    #[test]
    fn settings_missing_limits_fail() {
        let settings = RateLimitSettings::default();
        assert!(matches!(settings.config(), Err(ConfigError::MissingMaxRequests)));
    }
}
