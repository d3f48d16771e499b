//! Work notification delivery.

use crate::error::{RecipientError, platform_reason};
use chrono::{Local, NaiveDateTime};
use mailbridge_dingtalk::{CredentialCache, DingTalkApi, MarkdownMessage};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Most user ids the platform accepts per send call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Title used when neither a configured title nor a subject exists.
pub const UNTITLED: &str = "(no subject)";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Most user ids per send call.
    pub batch_size: usize,
    /// Fixed notification title; the subject is used when unset.
    pub title: Option<String>,
    /// Adds a `**From:**` line with the envelope sender.
    pub include_sender: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            title: None,
            include_sender: false,
        }
    }
}

/// Per-recipient result of one message.
///
/// Every recipient lands in exactly one of the two collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// User ids the notification was delivered to, in declaration order.
    pub succeeded: Vec<String>,
    /// Failures keyed by address (resolution) or user id (delivery).
    pub failed: BTreeMap<String, RecipientError>,
}

impl DispatchOutcome {
    /// Returns true if there were recipients and none succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    /// Number of recipients accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Renders the Markdown notification text.
#[must_use]
pub fn format_notification(
    subject: &str,
    body: &str,
    sender: Option<&str>,
    at: NaiveDateTime,
) -> String {
    let mut text = format!("## {subject}\n\n");
    if let Some(sender) = sender {
        text.push_str(&format!("**From:** {sender}\n\n"));
    }
    text.push_str(&format!("**Time:** {}\n\n", at.format(TIME_FORMAT)));
    text.push_str("---\n\n");
    text.push_str(body);
    text
}

/// Sends notifications to resolved users in batches.
pub struct Dispatcher {
    api: Arc<dyn DingTalkApi>,
    credentials: Arc<CredentialCache>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        api: Arc<dyn DingTalkApi>,
        credentials: Arc<CredentialCache>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            api,
            credentials,
            options,
        }
    }

    /// Returns the notification title for a subject.
    #[must_use]
    pub fn title_for(&self, subject: &str) -> String {
        match &self.options.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ if !subject.trim().is_empty() => subject.to_string(),
            _ => UNTITLED.to_string(),
        }
    }

    /// Delivers one notification to every user id.
    ///
    /// Ids are de-duplicated and sent in batches of at most the configured
    /// size, each batch with a freshly checked token. A failed batch does not
    /// stop later ones.
    pub async fn send(
        &self,
        user_ids: &[String],
        subject: &str,
        body: &str,
        sender: &str,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let mut seen = HashSet::new();
        let unique: Vec<String> = user_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return outcome;
        }

        let shown_sender = (self.options.include_sender && !sender.is_empty()).then_some(sender);
        let text = format_notification(subject, body, shown_sender, Local::now().naive_local());
        let message = MarkdownMessage::new(self.title_for(subject), text);

        let batch_size = self.options.batch_size.max(1);
        for (index, batch) in unique.chunks(batch_size).enumerate() {
            let token = match self.credentials.get_token().await {
                Ok(token) => token,
                Err(e) => {
                    warn!(batch = index, size = batch.len(), error = %e, "no access token for batch");
                    let reason = e.to_string();
                    for id in batch {
                        outcome
                            .failed
                            .insert(id.clone(), RecipientError::AuthFailed(reason.clone()));
                    }
                    continue;
                }
            };

            debug!(batch = index, size = batch.len(), "sending batch");
            match self.api.send_markdown(&token, batch, &message).await {
                Ok(task_id) => {
                    info!(batch = index, size = batch.len(), task_id, "notification sent");
                    outcome.succeeded.extend_from_slice(batch);
                }
                Err(e) => {
                    warn!(batch = index, size = batch.len(), error = %e, "notification rejected");
                    let reason = platform_reason(&e);
                    for id in batch {
                        outcome
                            .failed
                            .insert(id.clone(), RecipientError::DeliveryFailed(reason.clone()));
                    }
                }
            }
        }

        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;
    use chrono::NaiveDate;
    use std::sync::atomic::Ordering;

    fn dispatcher(platform: &Arc<FakePlatform>, options: DispatchOptions) -> Dispatcher {
        let api: Arc<dyn DingTalkApi> = Arc::clone(platform) as Arc<dyn DingTalkApi>;
        Dispatcher::new(
            Arc::clone(&api),
            Arc::new(CredentialCache::new(api)),
            options,
        )
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    #[test]
    fn test_format_notification() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 7)
            .unwrap();
        assert_eq!(
            format_notification("Build failed", "details", None, at),
            "## Build failed\n\n**Time:** 2024-03-09 08:05:07\n\n---\n\ndetails"
        );
        assert_eq!(
            format_notification("S", "b", Some("ci@example.com"), at),
            "## S\n\n**From:** ci@example.com\n\n**Time:** 2024-03-09 08:05:07\n\n---\n\nb"
        );
    }

    #[test]
    fn test_title_fallbacks() {
        let platform = Arc::new(FakePlatform::default());
        let plain = dispatcher(&platform, DispatchOptions::default());
        assert_eq!(plain.title_for("Deploy"), "Deploy");
        assert_eq!(plain.title_for("  "), UNTITLED);

        let fixed = dispatcher(
            &platform,
            DispatchOptions {
                title: Some("Git notice".to_string()),
                ..DispatchOptions::default()
            },
        );
        assert_eq!(fixed.title_for("Deploy"), "Git notice");
    }

    #[tokio::test]
    async fn test_batches_cover_every_id_once() {
        let platform = Arc::new(FakePlatform::default());
        let outcome = dispatcher(&platform, DispatchOptions::default())
            .send(&ids(250), "s", "b", "")
            .await;

        let batches = platform.sent_batches();
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(batches.concat(), ids(250));
        assert_eq!(outcome.succeeded, ids(250));
        assert!(outcome.failed.is_empty());
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        for (recipients, batch_size, expected) in [(1, 100, 1), (100, 100, 1), (101, 100, 2), (7, 3, 3), (5, 1, 5)] {
            let platform = Arc::new(FakePlatform::default());
            let options = DispatchOptions {
                batch_size,
                ..DispatchOptions::default()
            };
            dispatcher(&platform, options)
                .send(&ids(recipients), "s", "b", "")
                .await;
            let batches = platform.sent_batches();
            assert_eq!(batches.len(), expected, "{recipients} ids / {batch_size}");
            assert!(batches.iter().all(|b| b.len() <= batch_size));
        }
    }

    #[tokio::test]
    async fn test_duplicates_sent_once() {
        let platform = Arc::new(FakePlatform::default());
        let user_ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let outcome = dispatcher(&platform, DispatchOptions::default())
            .send(&user_ids, "s", "b", "")
            .await;
        assert_eq!(platform.sent_batches(), vec![vec!["a", "b"]]);
        assert_eq!(outcome.succeeded, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_no_ids_no_calls() {
        let platform = Arc::new(FakePlatform::default());
        let outcome = dispatcher(&platform, DispatchOptions::default())
            .send(&[], "s", "b", "")
            .await;
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_batch_does_not_stop_later_batches() {
        let platform = Arc::new(FakePlatform {
            rejected: ["u1".to_string()].into_iter().collect(),
            ..FakePlatform::default()
        });
        let options = DispatchOptions {
            batch_size: 2,
            ..DispatchOptions::default()
        };
        let outcome = dispatcher(&platform, options)
            .send(&ids(5), "s", "b", "")
            .await;

        assert_eq!(platform.sent_batches().len(), 3);
        assert_eq!(outcome.succeeded, vec!["u2", "u3", "u4"]);
        assert_eq!(
            outcome.failed.get("u0"),
            Some(&RecipientError::DeliveryFailed("invalid userid".to_string()))
        );
        assert!(outcome.failed.contains_key("u1"));
        assert_eq!(outcome.total(), 5);
    }

    #[tokio::test]
    async fn test_auth_failure_marks_every_batch() {
        let platform = Arc::new(FakePlatform::default());
        platform.deny_auth.store(true, Ordering::SeqCst);
        let options = DispatchOptions {
            batch_size: 2,
            ..DispatchOptions::default()
        };
        let outcome = dispatcher(&platform, options)
            .send(&ids(3), "s", "b", "")
            .await;

        assert!(platform.sent_batches().is_empty());
        assert!(outcome.all_failed());
        assert!(
            outcome
                .failed
                .values()
                .all(|e| matches!(e, RecipientError::AuthFailed(_)))
        );
        // Each batch retried authentication.
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_message_content() {
        let platform = Arc::new(FakePlatform::default());
        let options = DispatchOptions {
            include_sender: true,
            ..DispatchOptions::default()
        };
        dispatcher(&platform, options)
            .send(&ids(1), "", "hello", "ci@example.com")
            .await;

        let sends = platform.sends.lock().unwrap();
        let message = &sends[0].1;
        assert_eq!(message.title, UNTITLED);
        assert!(message.text.starts_with("## \n\n**From:** ci@example.com\n\n**Time:** "));
        assert!(message.text.ends_with("---\n\nhello"));
    }
}
