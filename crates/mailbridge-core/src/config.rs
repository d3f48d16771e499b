//! Bridge configuration file.

use crate::contacts::ContactMapping;
use crate::dispatch::{DEFAULT_BATCH_SIZE, DispatchOptions};
use crate::error::{Error, Result};
use mailbridge_dingtalk::Credentials;
use mailbridge_smtp::{
    DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_MAX_RECIPIENTS, DEFAULT_SHUTDOWN_GRACE, ServerConfig,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Platform application settings.
    pub dingtalk: DingTalkConfig,
    /// Inbound listener settings.
    pub smtp: SmtpConfig,
    /// Delivery settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Mail address to mobile number.
    #[serde(default)]
    pub user_mappings: BTreeMap<String, String>,
}

/// DingTalk application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DingTalkConfig {
    /// App key.
    pub app_key: String,
    /// App secret.
    pub app_secret: String,
    /// Agent id, a numeric string.
    pub agent_id: String,
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Fixed notification title.
    #[serde(default)]
    pub message_title: Option<String>,
}

/// Inbound SMTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Listen address, e.g. `0.0.0.0:2525`.
    pub listen_addr: String,
    /// Domain announced to clients.
    pub domain: String,
    /// Largest accepted message, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Most recipients per message.
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
    /// Read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Write timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub write_timeout_secs: u64,
    /// Seconds in-flight sessions get on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Most user ids per send call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Shows the envelope sender in the notification.
    #[serde(default)]
    pub include_sender: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_sender: false,
        }
    }
}

const fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

const fn default_max_recipients() -> usize {
    DEFAULT_MAX_RECIPIENTS
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_shutdown_grace_secs() -> u64 {
    DEFAULT_SHUTDOWN_GRACE.as_secs()
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// A configuration problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// App key is blank.
    EmptyAppKey,
    /// App secret is blank.
    EmptyAppSecret,
    /// Agent id is not a number.
    InvalidAgentId,
    /// Base URL override is blank.
    EmptyBaseUrl,
    /// Listen address is blank.
    EmptyListenAddr,
    /// Domain is blank.
    EmptyDomain,
    /// Message size limit is zero.
    ZeroMessageSize,
    /// Recipient limit is zero.
    ZeroRecipients,
    /// A timeout is zero.
    ZeroTimeout,
    /// Batch size is zero.
    ZeroBatchSize,
    /// No user mappings.
    NoUserMappings,
    /// A mapping has a blank address or mobile number.
    BlankMapping,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyAppKey => "dingtalk.app_key is required",
            Self::EmptyAppSecret => "dingtalk.app_secret is required",
            Self::InvalidAgentId => "dingtalk.agent_id must be a number",
            Self::EmptyBaseUrl => "dingtalk.base_url must not be blank",
            Self::EmptyListenAddr => "smtp.listen_addr is required",
            Self::EmptyDomain => "smtp.domain is required",
            Self::ZeroMessageSize => "smtp.max_message_bytes must be positive",
            Self::ZeroRecipients => "smtp.max_recipients must be positive",
            Self::ZeroTimeout => "smtp timeouts must be positive",
            Self::ZeroBatchSize => "dispatch.batch_size must be positive",
            Self::NoUserMappings => "user_mappings must not be empty",
            Self::BlankMapping => "user_mappings entries need an address and a mobile number",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

impl Config {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Serde`] if
    /// it is not valid JSON for this layout, and [`Error::Config`] listing
    /// every validation problem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate().map_err(|errors| {
            let messages: Vec<&str> = errors.iter().map(ValidationError::message).collect();
            Error::Config(messages.join("; "))
        })?;
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let dingtalk = &self.dingtalk;
        if dingtalk.app_key.trim().is_empty() {
            errors.push(ValidationError::EmptyAppKey);
        }
        if dingtalk.app_secret.trim().is_empty() {
            errors.push(ValidationError::EmptyAppSecret);
        }
        if dingtalk.agent_id.trim().parse::<i64>().is_err() {
            errors.push(ValidationError::InvalidAgentId);
        }
        if dingtalk.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            errors.push(ValidationError::EmptyBaseUrl);
        }

        let smtp = &self.smtp;
        if smtp.listen_addr.trim().is_empty() {
            errors.push(ValidationError::EmptyListenAddr);
        }
        if smtp.domain.trim().is_empty() {
            errors.push(ValidationError::EmptyDomain);
        }
        if smtp.max_message_bytes == 0 {
            errors.push(ValidationError::ZeroMessageSize);
        }
        if smtp.max_recipients == 0 {
            errors.push(ValidationError::ZeroRecipients);
        }
        if smtp.read_timeout_secs == 0 || smtp.write_timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout);
        }

        if self.dispatch.batch_size == 0 {
            errors.push(ValidationError::ZeroBatchSize);
        }

        if self.user_mappings.is_empty() {
            errors.push(ValidationError::NoUserMappings);
        } else if self
            .user_mappings
            .iter()
            .any(|(address, mobile)| address.trim().is_empty() || mobile.trim().is_empty())
        {
            errors.push(ValidationError::BlankMapping);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Platform credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the agent id is not a number.
    pub fn credentials(&self) -> Result<Credentials> {
        let agent_id = self
            .dingtalk
            .agent_id
            .trim()
            .parse()
            .map_err(|_| Error::Config(ValidationError::InvalidAgentId.message().to_string()))?;
        Ok(Credentials {
            app_key: self.dingtalk.app_key.trim().to_string(),
            app_secret: self.dingtalk.app_secret.trim().to_string(),
            agent_id,
        })
    }

    /// Listener settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let smtp = &self.smtp;
        let mut server = ServerConfig::new(smtp.listen_addr.trim(), smtp.domain.trim());
        server.max_message_bytes = smtp.max_message_bytes;
        server.max_recipients = smtp.max_recipients;
        server.read_timeout = Duration::from_secs(smtp.read_timeout_secs);
        server.write_timeout = Duration::from_secs(smtp.write_timeout_secs);
        server.shutdown_grace = Duration::from_secs(smtp.shutdown_grace_secs);
        server
    }

    /// Delivery settings.
    #[must_use]
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            batch_size: self.dispatch.batch_size,
            title: self.dingtalk.message_title.clone(),
            include_sender: self.dispatch.include_sender,
        }
    }

    /// The contact mapping, with normalized addresses.
    #[must_use]
    pub fn contact_mapping(&self) -> ContactMapping {
        self.user_mappings
            .iter()
            .map(|(address, mobile)| (address, mobile.trim()))
            .collect()
    }
}
