//! # mailbridge-core
//!
//! The pipeline between the SMTP listener and the DingTalk platform.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - Contact mapping from mail address to mobile number
//! - Identity resolution of recipients to platform users
//! - Batched work notification delivery
//! - [`Bridge`], the listener's message handler tying it all together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod bridge;
pub mod config;
pub mod contacts;
pub mod dispatch;
mod error;
pub mod resolver;
#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::{Config, ValidationError};
pub use contacts::{ContactMapping, extract_address, normalize_address};
pub use dispatch::{DispatchOptions, DispatchOutcome, Dispatcher, format_notification};
pub use error::{Error, RecipientError, Result};
pub use resolver::{IdentityResolver, Resolution, ResolvedRecipient};
