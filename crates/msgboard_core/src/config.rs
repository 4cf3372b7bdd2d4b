//! Service configuration for the message client.
//!
//! # Responsibility
//! - Resolve the service base URL the client talks to.
//! - Derive the messages endpoint from that base URL.
//!
//! # Invariants
//! - `messages_url()` is always `{service_base_url}/api/messages` with any
//!   trailing `/` of the base removed first.
//! - A validated config only carries `http`/`https` base URLs.

use reqwest::Url;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Env var holding the service base URL.
pub const ENV_SERVICE_BASE_URL: &str = "MSGBOARD_SERVICE_BASE_URL";
/// Env var holding the request timeout in milliseconds.
pub const ENV_HTTP_TIMEOUT_MS: &str = "MSGBOARD_HTTP_TIMEOUT_MS";
/// Path of the messages resource relative to the service base URL.
pub const MESSAGES_PATH: &str = "/api/messages";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidUrl(String),
    InvalidTimeout(String),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(name) => write!(f, "environment variable `{name}` must be set"),
            Self::InvalidUrl(value) => {
                write!(f, "service base url must be an absolute http(s) url, got `{value}`")
            }
            Self::InvalidTimeout(value) => {
                write!(f, "request timeout must be a positive integer, got `{value}`")
            }
            Self::Io(err) => write!(f, "failed to read config file: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config file: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::MissingVar(_) | Self::InvalidUrl(_) | Self::InvalidTimeout(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Where the message service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    pub service_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServiceConfig {
    pub fn new(service_base_url: impl Into<String>) -> Self {
        Self {
            service_base_url: service_base_url.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Reads config from `MSGBOARD_SERVICE_BASE_URL` and
    /// `MSGBOARD_HTTP_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads a JSON config file such as
    /// `{ "service_base_url": "http://localhost:8080" }`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let base = lookup(ENV_SERVICE_BASE_URL)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingVar(ENV_SERVICE_BASE_URL))?;

        let mut config = Self::new(base);
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_MS) {
            config.request_timeout_ms = parse_timeout(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the base URL and timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(self.service_base_url.trim())
            .map_err(|_| ConfigError::InvalidUrl(self.service_base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(self.service_base_url.clone()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("0".to_string()));
        }
        Ok(())
    }

    /// Endpoint of the messages resource.
    pub fn messages_url(&self) -> String {
        format!(
            "{}{MESSAGES_PATH}",
            self.service_base_url.trim().trim_end_matches('/')
        )
    }
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServiceConfig, DEFAULT_REQUEST_TIMEOUT_MS};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn from_lookup_reads_base_url_and_timeout() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("MSGBOARD_SERVICE_BASE_URL", "http://localhost:8080"),
            ("MSGBOARD_HTTP_TIMEOUT_MS", "1500"),
        ]))
        .expect("config should load");

        assert_eq!(config.service_base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout_ms, 1500);
    }

    #[test]
    fn from_lookup_requires_base_url() {
        let err = ServiceConfig::from_lookup(lookup(&[])).expect_err("missing base url");
        assert!(matches!(err, ConfigError::MissingVar("MSGBOARD_SERVICE_BASE_URL")));
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("MSGBOARD_SERVICE_BASE_URL", "http://localhost"),
            ("MSGBOARD_HTTP_TIMEOUT_MS", "soon"),
        ]))
        .expect_err("bad timeout");
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }

    #[test]
    fn validate_rejects_non_http_schemes() {
        let err = ServiceConfig::new("ftp://files.example.com")
            .validate()
            .expect_err("ftp must be rejected");
        assert!(err.to_string().contains("http(s)"));
        assert!(ServiceConfig::new("not a url").validate().is_err());
    }

    #[test]
    fn messages_url_trims_trailing_slash() {
        let config = ServiceConfig::new("https://chat.example.com/");
        assert_eq!(config.messages_url(), "https://chat.example.com/api/messages");
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
    }
}
