//! Per-connection mail transaction state.
//!
//! ```text
//! ┌──────┐ begin_transaction ┌───────┐ add_recipient ┌────────────┐
//! │ Idle │ ────────────────→ │ Ready │ ────────────→ │ Collecting │ ─┐
//! └──────┘                   └───────┘               └────────────┘  │ add_recipient
//!    ↑                           │ submit_body             │    ↑────┘
//!    │ begin_transaction         ↓                         │ submit_body
//!    └────────────────────── Completed ←──────────────────┘
//! ```
//!
//! `reset` returns to `Idle` from anywhere.

use crate::error::SessionError;
use crate::types::{Envelope, Reply};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Receives each completed message.
///
/// One handler instance is shared by every session of a listener.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Result of processing one message.
    type Outcome: Send;

    /// Processes a message: `data` is the raw RFC 5322 content as received.
    async fn deliver(&self, envelope: &Envelope, data: Vec<u8>) -> Self::Outcome;

    /// Chooses the SMTP reply that ends the DATA phase.
    fn reply_for(&self, outcome: &Self::Outcome) -> Reply;
}

/// Where a session stands in its mail transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transaction in progress.
    Idle,
    /// Sender known, no recipients yet.
    Ready,
    /// Sender and at least one recipient known.
    Collecting,
    /// The last transaction's message was handed to the handler.
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Ready => "Ready",
            Self::Collecting => "Collecting",
            Self::Completed => "Completed",
        };
        f.write_str(name)
    }
}

/// Accumulates the envelope and body of one message at a time.
pub struct IngestionSession<H> {
    handler: Arc<H>,
    state: SessionState,
    envelope: Envelope,
}

impl<H: MessageHandler> IngestionSession<H> {
    /// Creates an idle session.
    #[must_use]
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            state: SessionState::Idle,
            envelope: Envelope::default(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the envelope collected so far.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Returns true if a message body may be submitted now.
    #[must_use]
    pub const fn accepts_body(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::Collecting)
    }

    /// Starts a transaction for `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Idle` or `Completed`.
    pub fn begin_transaction(&mut self, sender: impl Into<String>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Completed => {
                self.envelope = Envelope::new(sender);
                self.state = SessionState::Ready;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                state,
                operation: "begin_transaction",
            }),
        }
    }

    /// Appends a recipient.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless a sender is known.
    pub fn add_recipient(&mut self, address: impl Into<String>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ready | SessionState::Collecting => {
                self.envelope.recipients.push(address.into());
                self.state = SessionState::Collecting;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                state,
                operation: "add_recipient",
            }),
        }
    }

    /// Hands the message to the handler and completes the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Ready` or `Collecting`.
    pub async fn submit_body(&mut self, raw: Vec<u8>) -> Result<H::Outcome, SessionError> {
        if !self.accepts_body() {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                operation: "submit_body",
            });
        }

        let envelope = std::mem::take(&mut self.envelope);
        let outcome = self.handler.deliver(&envelope, raw).await;
        self.state = SessionState::Completed;
        Ok(outcome)
    }

    /// Chooses the reply for an outcome of [`Self::submit_body`].
    #[must_use]
    pub fn reply_for(&self, outcome: &H::Outcome) -> Reply {
        self.handler.reply_for(outcome)
    }

    /// Discards any transaction in progress.
    pub fn reset(&mut self) {
        self.envelope = Envelope::default();
        self.state = SessionState::Idle;
    }
}

impl<H> fmt::Debug for IngestionSession<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionSession")
            .field("state", &self.state)
            .field("envelope", &self.envelope)
            .finish_non_exhaustive()
    }
}
