//! Error types for SMTP operations.

use crate::session::SessionState;
use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer did not send or accept data in time.
    #[error("Timed out while {0}")]
    Timeout(&'static str),

    /// A command line exceeded the length limit.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Message data exceeded the size limit. The data was read to its end.
    #[error("Message exceeds size limit: {0} bytes")]
    MessageTooLarge(usize),

    /// Unrecognized command verb.
    #[error("Unrecognized command: {0}")]
    UnknownCommand(String),

    /// Malformed command parameters.
    #[error("Syntax error in parameters: {0}")]
    Syntax(String),

    /// AUTH requested a mechanism that is not offered.
    #[error("Unsupported authentication mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Command not valid in the current session state.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Ingestion session state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The operation is not allowed from the current state.
    #[error("{operation} not allowed in state {state}")]
    InvalidTransition {
        /// State the session was in.
        state: SessionState,
        /// Rejected operation.
        operation: &'static str,
    },
}
