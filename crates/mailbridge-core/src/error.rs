//! Error types for the bridge pipeline.

use thiserror::Error;

/// Errors that can occur while setting up the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DingTalk client setup failed.
    #[error("DingTalk error: {0}")]
    DingTalk(#[from] mailbridge_dingtalk::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why one recipient did not receive the notification.
///
/// Scoped to a single recipient (or the batch it was sent in); never aborts
/// the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipientError {
    /// The address has no contact mapping.
    #[error("No contact mapping for address")]
    NotMapped,

    /// The platform could not resolve the contact key to a user.
    #[error("User lookup failed: {0}")]
    LookupFailed(String),

    /// No access token could be obtained.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The platform rejected the notification.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Returns the platform's own message for API errors, the full error
/// otherwise.
pub(crate) fn platform_reason(error: &mailbridge_dingtalk::Error) -> String {
    match error {
        mailbridge_dingtalk::Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
