//! Client configuration: API key, base URL and per-call timeout.
//!
//! Validated once at construction and immutable afterwards.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.lightfeed.ai";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_ENV: &str = "LIGHTFEED_API_KEY";
pub const BASE_URL_ENV: &str = "LIGHTFEED_BASE_URL";
pub const TIMEOUT_ENV: &str = "LIGHTFEED_TIMEOUT_SECS";

#[derive(Clone, PartialEq, Eq)]
pub struct LightfeedConfig {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl LightfeedConfig {
    /// Configuration with the default base URL and timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the base URL. Trailing slashes are stripped.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));
        match host {
            Some(h) if !h.is_empty() && !h.contains(char::is_whitespace) => {
                self.base_url = trimmed.to_string();
                Ok(self)
            }
            _ => Err(ConfigError::InvalidBaseUrl(base_url.to_string())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("timeout must be non-zero".to_string()));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Read `LIGHTFEED_API_KEY`, `LIGHTFEED_BASE_URL` and
    /// `LIGHTFEED_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_ENV).ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key)?;
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config = config.with_base_url(&url)?;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(format!("`{raw}` is not a number of seconds")))?;
            config = config.with_timeout(Duration::from_secs(secs))?;
        }
        Ok(config)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for LightfeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightfeedConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = LightfeedConfig::new("test-api-key").unwrap();
        assert_eq!(config.api_key(), "test-api-key");
        assert_eq!(config.base_url(), "https://api.lightfeed.ai");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn custom_values() {
        let config = LightfeedConfig::new("custom-api-key")
            .unwrap()
            .with_base_url("https://custom-api.example.com/")
            .unwrap()
            .with_timeout(Duration::from_secs(10))
            .unwrap();
        assert_eq!(config.base_url(), "https://custom-api.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(LightfeedConfig::new(" ").unwrap_err(), ConfigError::MissingApiKey);

        let base = LightfeedConfig::new("k").unwrap();
        for url in ["", "api.lightfeed.ai", "ftp://x", "https://", "http://a b"] {
            assert!(
                matches!(base.clone().with_base_url(url), Err(ConfigError::InvalidBaseUrl(_))),
                "{url}"
            );
        }
        assert!(matches!(
            base.with_timeout(Duration::ZERO),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = LightfeedConfig::new("super-secret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = LightfeedConfig::from_lookup(lookup(&[
            (API_KEY_ENV, "env-key"),
            (BASE_URL_ENV, "http://localhost:8080"),
            (TIMEOUT_ENV, "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_key(), "env-key");
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn from_lookup_requires_api_key() {
        let err = LightfeedConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);

        let err = LightfeedConfig::from_lookup(lookup(&[(API_KEY_ENV, "k"), (TIMEOUT_ENV, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }
}
