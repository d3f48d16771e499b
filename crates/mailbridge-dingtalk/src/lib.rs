//! # mailbridge-dingtalk
//!
//! Client for the subset of the DingTalk open API used to deliver work
//! notifications, plus a concurrency-safe access token cache.
//!
//! ## Features
//!
//! - **Authentication**: app key/secret exchange for an access token
//! - **Identity lookup**: user id by mobile number
//! - **Work notifications**: Markdown messages to many users at once
//! - **Token caching**: one refresh at a time, early expiry margin
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailbridge_dingtalk::{Client, Credentials, CredentialCache, DingTalkApi, MarkdownMessage};
//!
//! let api: Arc<dyn DingTalkApi> = Arc::new(Client::new(Credentials {
//!     app_key: "ding...".to_string(),
//!     app_secret: "secret".to_string(),
//!     agent_id: 123456,
//! })?);
//! let cache = CredentialCache::new(Arc::clone(&api));
//!
//! let token = cache.get_token().await?;
//! let user_id = api.user_id_by_mobile(&token, "13800000000").await?;
//! let message = MarkdownMessage::new("Hello", "## Hello\n\nfrom mailbridge");
//! api.send_markdown(&cache.get_token().await?, &[user_id], &message).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod api;
mod cache;
mod client;
mod error;
pub mod token;

pub use api::{DingTalkApi, MarkdownMessage, TokenGrant};
pub use cache::CredentialCache;
pub use client::{Client, Credentials, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use token::Token;
