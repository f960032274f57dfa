// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Why a page could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request did not complete within the configured timeout
    Timeout,
    /// The server answered with a non-success status code
    Status(u16),
    /// Connection, TLS, decoding or any other transport problem
    Transport(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Status(code) => write!(f, "HTTP status {code}"),
            FetchFailure::Transport(message) => write!(f, "{message}"),
        }
    }
}

impl From<&reqwest::Error> for FetchFailure {
    fn from(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchFailure::Timeout
        } else if let Some(status) = error.status() {
            FetchFailure::Status(status.as_u16())
        } else {
            FetchFailure::Transport(error.to_string())
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request failed outside a page fetch
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A page fetch failed (timeouts are reported separately from data errors)
    #[error("Failed to fetch {url}: {failure}")]
    Fetch { url: String, failure: FetchFailure },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for the given URL.
    pub fn fetch(url: impl Into<String>, failure: FetchFailure) -> Self {
        Self::Fetch {
            url: url.into(),
            failure,
        }
    }

    /// Whether this error came from fetching a page rather than processing it.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Whether this error is a fetch timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                failure: FetchFailure::Timeout,
                ..
            }
        )
    }
}
