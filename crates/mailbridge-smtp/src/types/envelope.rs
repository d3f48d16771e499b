//! Message envelope.

/// Sender and recipients of one mail transaction, as given by the client.
///
/// Addresses are kept in their raw form (possibly `Name <addr>`); consumers
/// normalize them as they need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` path; empty for the null sender.
    pub sender: String,
    /// `RCPT TO` paths in the order received.
    pub recipients: Vec<String>,
}

impl Envelope {
    /// Creates an envelope with no recipients yet.
    #[must_use]
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients: Vec::new(),
        }
    }
}
