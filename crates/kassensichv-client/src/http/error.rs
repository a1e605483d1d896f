/*
[INPUT]:  Error sources (transport, API status, serialization, auth, signing)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the KassenSichV client
#[derive(Error, Debug)]
pub enum KassensichvError {
    /// Network-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("HTTP error (status {status}): {body}")]
    Http { status: StatusCode, body: String },

    /// The auth endpoint rejected the credentials or refresh token
    #[error("Authentication failed: {message}")]
    Authentication {
        status: Option<StatusCode>,
        message: String,
    },

    /// Transaction request has no parseable TSS identifier
    #[error("Malformed transaction request: {0}")]
    MalformedRequest(String),

    /// Transaction body is not valid JSON
    #[error("Invalid transaction payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// Signing module failed to produce an envelope
    #[error("Signing failed: {message}")]
    Signing { code: Option<i64>, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Header name or value could not be encoded
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client was shut down; no further requests are accepted
    #[error("Client has been shut down")]
    Closed,
}

impl KassensichvError {
    /// Check if the error is worth retrying by the caller.
    ///
    /// Signing failures are never retryable: a signing module may already have
    /// advanced its counters.
    pub fn is_retryable(&self) -> bool {
        match self {
            KassensichvError::Transport(err) => err.is_timeout() || err.is_connect(),
            KassensichvError::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        match self {
            KassensichvError::Authentication { .. } => true,
            KassensichvError::Http { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }

    /// Status code attached to the error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            KassensichvError::Transport(err) => err.status(),
            KassensichvError::Http { status, .. } => Some(*status),
            KassensichvError::Authentication { status, .. } => *status,
            _ => None,
        }
    }

    /// Create an HTTP error from status code and response body
    pub fn http_error(status: StatusCode, body: impl Into<String>) -> Self {
        KassensichvError::Http {
            status,
            body: body.into(),
        }
    }

    pub(crate) fn signing(message: impl Into<String>) -> Self {
        KassensichvError::Signing {
            code: None,
            message: message.into(),
        }
    }
}

/// Result type alias for KassenSichV operations
pub type Result<T> = std::result::Result<T, KassensichvError>;
