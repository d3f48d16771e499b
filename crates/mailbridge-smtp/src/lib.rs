//! # mailbridge-smtp
//!
//! Minimal inbound SMTP listener (RFC 5321) that collects messages and hands
//! them to a [`MessageHandler`].
//!
//! ## Features
//!
//! - **Ingestion session**: explicit state machine for one mail transaction
//!   at a time
//! - **Protocol surface**: HELO/EHLO, MAIL, RCPT, DATA, RSET, NOOP, VRFY,
//!   AUTH (PLAIN, LOGIN), QUIT
//! - **Limits**: message size, recipient count, command line length, read
//!   and write timeouts
//! - **Graceful shutdown**: stop accepting, then give sessions a grace period
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailbridge_smtp::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::new("0.0.0.0:2525", "mail.example.com"), Arc::new(handler));
//! let listener = server.bind().await?;
//! server.serve(listener, async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command parser
//! - [`session`]: Ingestion session state machine and handler trait
//! - [`stream`]: Line and DATA framing with timeouts
//! - [`types`]: Replies, extensions, envelope and path parsing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
mod server;
pub mod session;
pub mod stream;
pub mod types;

pub use command::Command;
pub use error::{Error, Result, SessionError};
pub use server::{
    DEFAULT_IO_TIMEOUT, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_MAX_RECIPIENTS, DEFAULT_SHUTDOWN_GRACE,
    Server, ServerConfig,
};
pub use session::{IngestionSession, MessageHandler, SessionState};
pub use types::{AuthMechanism, Envelope, Extension, Reply, ReplyCode};
