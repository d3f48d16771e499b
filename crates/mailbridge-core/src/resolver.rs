//! Recipient address to platform user resolution.

use crate::contacts::{ContactMapping, normalize_address};
use crate::error::{RecipientError, platform_reason};
use mailbridge_dingtalk::{CredentialCache, DingTalkApi};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A recipient the platform knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipient {
    /// Normalized mail address.
    pub address: String,
    /// Platform user id.
    pub user_id: String,
}

/// Result of resolving every recipient of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved recipients, in declaration order.
    pub resolved: Vec<ResolvedRecipient>,
    /// Failures keyed by normalized address.
    pub failed: BTreeMap<String, RecipientError>,
}

/// Maps recipient addresses to platform user ids.
pub struct IdentityResolver {
    contacts: Arc<ContactMapping>,
    api: Arc<dyn DingTalkApi>,
    credentials: Arc<CredentialCache>,
}

impl IdentityResolver {
    /// Creates a resolver over a fixed contact mapping.
    #[must_use]
    pub fn new(
        contacts: Arc<ContactMapping>,
        api: Arc<dyn DingTalkApi>,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        Self {
            contacts,
            api,
            credentials,
        }
    }

    /// Resolves one recipient (raw form, e.g. `Name <addr>`).
    ///
    /// # Errors
    ///
    /// - [`RecipientError::NotMapped`] if the address has no contact key
    /// - [`RecipientError::AuthFailed`] if no access token is available
    /// - [`RecipientError::LookupFailed`] if the platform does not know the
    ///   contact key
    pub async fn resolve(&self, recipient: &str) -> Result<ResolvedRecipient, RecipientError> {
        let address = normalize_address(recipient);
        let Some(mobile) = self.contacts.contact_key(&address) else {
            return Err(RecipientError::NotMapped);
        };

        let token = self
            .credentials
            .get_token()
            .await
            .map_err(|e| RecipientError::AuthFailed(e.to_string()))?;

        let user_id = self
            .api
            .user_id_by_mobile(&token, mobile)
            .await
            .map_err(|e| RecipientError::LookupFailed(platform_reason(&e)))?;

        debug!(%address, %user_id, "recipient resolved");
        Ok(ResolvedRecipient { address, user_id })
    }

    /// Resolves every recipient in declaration order without stopping at
    /// failures. Repeated addresses are resolved once.
    pub async fn resolve_all(&self, recipients: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        for recipient in recipients {
            let address = normalize_address(recipient);
            if !seen.insert(address.clone()) {
                continue;
            }
            match self.resolve(recipient).await {
                Ok(resolved) => resolution.resolved.push(resolved),
                Err(e) => {
                    warn!(%address, error = %e, "recipient not resolved");
                    resolution.failed.insert(address, e);
                }
            }
        }

        resolution
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("contacts", &self.contacts.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;
    use std::sync::atomic::Ordering;

    fn resolver(platform: &Arc<FakePlatform>) -> IdentityResolver {
        let contacts: ContactMapping = [
            ("alice@example.com", "13800000001"),
            ("bob@example.com", "13800000002"),
            ("ghost@example.com", "13800000009"),
        ]
        .into_iter()
        .collect();
        let api: Arc<dyn DingTalkApi> = Arc::clone(platform) as Arc<dyn DingTalkApi>;
        IdentityResolver::new(
            Arc::new(contacts),
            Arc::clone(&api),
            Arc::new(CredentialCache::new(api)),
        )
    }

    fn platform() -> Arc<FakePlatform> {
        Arc::new(FakePlatform::with_users(&[
            ("13800000001", "u-alice"),
            ("13800000002", "u-bob"),
        ]))
    }

    #[tokio::test]
    async fn test_resolve_display_name_form() {
        let platform = platform();
        let resolved = resolver(&platform)
            .resolve("Alice <ALICE@example.com>")
            .await
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedRecipient {
                address: "alice@example.com".to_string(),
                user_id: "u-alice".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unmapped_address_skips_platform() {
        let platform = platform();
        let result = resolver(&platform).resolve("carol@example.com").await;
        assert_eq!(result, Err(RecipientError::NotMapped));
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_carries_platform_message() {
        let platform = platform();
        let result = resolver(&platform).resolve("ghost@example.com").await;
        assert_eq!(
            result,
            Err(RecipientError::LookupFailed("user not found".to_string()))
        );
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let platform = platform();
        platform.deny_auth.store(true, Ordering::SeqCst);
        let result = resolver(&platform).resolve("bob@example.com").await;
        assert!(matches!(result, Err(RecipientError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_resolve_all_keeps_order_and_continues() {
        let platform = platform();
        let recipients = vec![
            "bob@example.com".to_string(),
            "carol@example.com".to_string(),
            "Bob <bob@example.com>".to_string(),
            "ghost@example.com".to_string(),
            "alice@example.com".to_string(),
        ];
        let resolution = resolver(&platform).resolve_all(&recipients).await;

        let ids: Vec<_> = resolution.resolved.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u-bob", "u-alice"]);
        assert_eq!(resolution.failed.len(), 2);
        assert_eq!(
            resolution.failed.get("carol@example.com"),
            Some(&RecipientError::NotMapped)
        );
        assert!(matches!(
            resolution.failed.get("ghost@example.com"),
            Some(RecipientError::LookupFailed(_))
        ));
        assert_eq!(platform.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(platform.lookups.lock().unwrap().len(), 3);
    }
}
