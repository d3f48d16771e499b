//! The mail to notification pipeline.

use crate::contacts::ContactMapping;
use crate::dispatch::{DispatchOptions, DispatchOutcome, Dispatcher};
use crate::resolver::IdentityResolver;
use async_trait::async_trait;
use mailbridge_dingtalk::{CredentialCache, DingTalkApi};
use mailbridge_smtp::{Envelope, MessageHandler, Reply, ReplyCode};
use std::sync::Arc;
use tracing::{info, warn};

/// Decodes each received message, resolves its recipients and sends the
/// notification.
#[derive(Debug)]
pub struct Bridge {
    resolver: IdentityResolver,
    dispatcher: Dispatcher,
}

impl Bridge {
    /// Creates a pipeline sharing one credential cache between lookup and
    /// delivery.
    #[must_use]
    pub fn new(
        api: Arc<dyn DingTalkApi>,
        credentials: Arc<CredentialCache>,
        contacts: Arc<ContactMapping>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(contacts, Arc::clone(&api), Arc::clone(&credentials)),
            dispatcher: Dispatcher::new(api, credentials, options),
        }
    }

    /// Runs the pipeline for one message.
    pub async fn process(&self, envelope: &Envelope, raw: &[u8]) -> DispatchOutcome {
        let message = mailbridge_mime::decode(raw);
        info!(
            sender = %envelope.sender,
            recipients = envelope.recipients.len(),
            subject = %message.subject,
            bytes = raw.len(),
            "message received"
        );
        for degradation in &message.degradations {
            warn!(%degradation, "message decoded with fallback");
        }

        let resolution = self.resolver.resolve_all(&envelope.recipients).await;
        let user_ids: Vec<String> = resolution
            .resolved
            .into_iter()
            .map(|recipient| recipient.user_id)
            .collect();

        let mut outcome = self
            .dispatcher
            .send(&user_ids, &message.subject, &message.body, &envelope.sender)
            .await;
        outcome.failed.extend(resolution.failed);

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "message dispatched"
        );
        outcome
    }
}

#[async_trait]
impl MessageHandler for Bridge {
    type Outcome = DispatchOutcome;

    async fn deliver(&self, envelope: &Envelope, data: Vec<u8>) -> DispatchOutcome {
        self.process(envelope, &data).await
    }

    fn reply_for(&self, outcome: &DispatchOutcome) -> Reply {
        if outcome.all_failed() {
            Reply::single(
                ReplyCode::TRANSACTION_FAILED,
                format!("Delivery failed for all {} recipients", outcome.failed.len()),
            )
        } else {
            Reply::single(ReplyCode::OK, "OK: message accepted")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::RecipientError;
    use crate::testing::FakePlatform;

    fn bridge(platform: &Arc<FakePlatform>) -> Bridge {
        let api: Arc<dyn DingTalkApi> = Arc::clone(platform) as Arc<dyn DingTalkApi>;
        let contacts: ContactMapping = [("alice@example.com", "13800000001")].into_iter().collect();
        Bridge::new(
            Arc::clone(&api),
            Arc::new(CredentialCache::new(api)),
            Arc::new(contacts),
            DispatchOptions::default(),
        )
    }

    fn envelope(recipients: &[&str]) -> Envelope {
        Envelope {
            sender: "ci@example.com".to_string(),
            recipients: recipients.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn test_reply_for_partial_success() {
        let platform = Arc::new(FakePlatform::with_users(&[("13800000001", "u-alice")]));
        let bridge = bridge(&platform);
        let outcome = bridge
            .process(
                &envelope(&["alice@example.com", "carol@example.com"]),
                b"Subject: hi\r\n\r\nbody",
            )
            .await;

        assert_eq!(outcome.succeeded, vec!["u-alice"]);
        assert_eq!(
            outcome.failed.get("carol@example.com"),
            Some(&RecipientError::NotMapped)
        );
        assert_eq!(bridge.reply_for(&outcome).code, ReplyCode::OK);
    }

    #[tokio::test]
    async fn test_reply_for_total_failure() {
        let platform = Arc::new(FakePlatform::default());
        let bridge = bridge(&platform);
        let outcome = bridge
            .process(&envelope(&["carol@example.com"]), b"Subject: hi\r\n\r\nbody")
            .await;

        assert!(outcome.all_failed());
        assert_eq!(bridge.reply_for(&outcome).code, ReplyCode::TRANSACTION_FAILED);
        assert!(platform.sent_batches().is_empty());
    }

    #[tokio::test]
    async fn test_reply_for_no_recipients() {
        let platform = Arc::new(FakePlatform::default());
        let bridge = bridge(&platform);
        let outcome = bridge.process(&envelope(&[]), b"Subject: hi\r\n\r\nbody").await;

        assert_eq!(outcome.total(), 0);
        assert_eq!(bridge.reply_for(&outcome).code, ReplyCode::OK);
    }
}
