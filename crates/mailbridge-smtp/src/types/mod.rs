//! Core SMTP types.

mod address;
mod envelope;
mod extension;
mod reply;

pub use address::{declared_size, parse_path};
pub use envelope::Envelope;
pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyCode};
