// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for netsnare
//!
//! Decision errors (unknown id, malformed modification) are resolved through
//! the continuation result and never escape as panics. Admission misses are
//! not errors at all: see [`crate::network::BypassReason`].

use thiserror::Error;

use crate::network::ErrorReason;

/// Result type alias for netsnare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for netsnare
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Continuation or lookup for an id with no pending job
    #[error("Unknown interception id: {0}")]
    UnknownInterceptionId(String),

    /// A second decision for an id whose job already has one
    #[error("Interception {0} already has a decision")]
    AlreadyDecided(String),

    /// A decision for a job that stopped waiting and went on without one
    #[error("Interception {0} is no longer waiting for a decision")]
    DecisionExpired(String),

    /// More than one exclusive kind set, or a required field missing
    #[error("Malformed modification: {0}")]
    MalformedModification(String),

    /// The registry actors have shut down
    #[error("Interception registry has been closed")]
    RegistryClosed,

    /// Request finished with an error by a policy decision
    #[error("Request {id} failed by interception: {reason:?}")]
    Intercepted { id: String, reason: ErrorReason },

    /// Raw mock response could not be parsed
    #[error("Invalid mock response: {0}")]
    MockResponse(String),

    /// Redirect limit exceeded
    #[error("Too many redirects ({count}) starting at {url}")]
    TooManyRedirects { url: String, count: u32 },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unknown interception id error
    pub fn unknown_id(id: impl Into<String>) -> Self {
        Error::UnknownInterceptionId(id.into())
    }

    /// Create a malformed modification error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedModification(msg.into())
    }

    /// Create a mock response error
    pub fn mock_response<S: Into<String>>(msg: S) -> Self {
        Error::MockResponse(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: None,
        }
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this error came out of the decision protocol
    pub fn is_decision_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownInterceptionId(_)
                | Error::AlreadyDecided(_)
                | Error::DecisionExpired(_)
                | Error::MalformedModification(_)
        )
    }

    /// Check if this is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Http(_) => true,
            Error::Intercepted { reason, .. } => reason.is_transient(),
            _ => false,
        }
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Timeout { url: Some(u), .. } => Some(u),
            Error::TooManyRedirects { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
