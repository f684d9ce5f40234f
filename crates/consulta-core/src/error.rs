//! Errors raised by the chat API client.

use thiserror::Error;

/// Failure of a single chat exchange.
///
/// None of these reach the user verbatim: the session turns every variant
/// into the same fallback assistant message and only logs the detail.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The caller cancelled the request before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// The backend could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        /// Response body text, or the status reason phrase when empty.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL could not be joined with the chat path.
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ChatError {
    /// Short, stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Timeout(_) => "timeout",
            ChatError::Cancelled => "cancelled",
            ChatError::Network(_) => "network",
            ChatError::Status { .. } => "status",
            ChatError::Decode(_) => "decode",
            ChatError::InvalidUrl(_) => "invalid_url",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
