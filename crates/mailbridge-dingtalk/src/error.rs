//! Error types for DingTalk API operations.

use std::time::Duration;

/// Result type alias for DingTalk API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// DingTalk API error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The platform answered with a non-zero `errcode`.
    #[error("DingTalk error {code}: {message}")]
    Api {
        /// Platform error code.
        code: i64,
        /// Platform error message (`errmsg`).
        message: String,
    },

    /// A freshly issued access token would already be stale once the
    /// refresh margin is applied.
    #[error("Access token lifetime {lifetime:?} does not exceed refresh margin {margin:?}")]
    TokenLifetime {
        /// Lifetime granted by the platform.
        lifetime: Duration,
        /// Configured refresh margin.
        margin: Duration,
    },

    /// A success response lacked a required field.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Creates an API error from a platform error code and message.
    #[must_use]
    pub fn api_error(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }
}
