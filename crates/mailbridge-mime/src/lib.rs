//! # mailbridge-mime
//!
//! Turns a raw RFC 5322 message into a subject line and a readable body
//! suitable for a chat notification.
//!
//! ## Features
//!
//! - **Headers**: unfolding, case-insensitive lookup, RFC 2047 encoded words
//! - **Transfer encodings**: lenient Base64 and Quoted-Printable
//! - **Multipart**: nested walk with HTML preferred over plain text
//! - **HTML**: converted to Markdown, style and script content dropped
//! - **Graceful degradation**: decoding never fails, fallbacks are reported
//!
//! ## Quick Start
//!
//! ```
//! use mailbridge_mime::decode;
//!
//! let raw = b"Subject: =?utf-8?B?SGVsbG8=?=\r\n\
//!             Content-Type: text/html; charset=utf-8\r\n\
//!             \r\n\
//!             <p>Build <b>passed</b></p>";
//!
//! let message = decode(raw);
//! assert_eq!(message.subject, "Hello");
//! assert!(message.body.contains("**passed**"));
//! assert!(message.degradations.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod charset;
mod content_type;
mod decode;
mod error;
mod header;
mod html;
mod message;
mod multipart;

pub mod encoding;

pub use charset::{Charset, decode_charset};
pub use content_type::ContentType;
pub use decode::{DecodedMessage, Degradation, MAX_NESTING_DEPTH, MAX_PARTS, decode};
pub use error::{Error, Result};
pub use header::Headers;
pub use html::{html_to_markdown, strip_style_blocks};
pub use message::{Part, TransferEncoding, split_header_body};
pub use multipart::{Multipart, split_multipart};
