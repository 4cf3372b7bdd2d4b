//! Connection error type shared by transports and the connection.
//!
//! # Responsibility
//! - Carry transport, status, URL, response-shape and config failures.
//! - Render each failure as one log-friendly line.
//!
//! # Invariants
//! - `Status` keeps the numeric HTTP status and the request URL.
//! - Only a 404 `Status` counts as not found.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Errors raised by message connection operations.
#[derive(Debug)]
pub enum ConnectionError {
    /// Request could not be sent or the response body could not be read.
    Http(reqwest::Error),
    /// Server answered with a non-success status.
    Status { status: u16, url: String },
    InvalidUrl(String),
    /// Response body does not have the expected shape.
    InvalidResponse(String),
    /// Operation addresses an existing record but no usable id was given.
    MissingId(&'static str),
    Config(ConfigError),
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "http request failed: {err}"),
            Self::Status { status, url } => write!(f, "server returned status {status} for {url}"),
            Self::InvalidUrl(message) => write!(f, "invalid request url: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid response body: {message}"),
            Self::MissingId(operation) => write!(f, "{operation} requires a message id"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Status { .. }
            | Self::InvalidUrl(_)
            | Self::InvalidResponse(_)
            | Self::MissingId(_) => None,
        }
    }
}

impl From<reqwest::Error> for ConnectionError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<ConfigError> for ConnectionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl ConnectionError {
    /// Returns whether the server reported the record as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
