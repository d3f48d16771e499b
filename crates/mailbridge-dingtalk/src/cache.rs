//! Shared access token cache.

use crate::api::DingTalkApi;
use crate::error::{Error, Result};
use crate::token::{DEFAULT_REFRESH_MARGIN, Token};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Hands out a valid access token to any number of concurrent callers.
///
/// Readers share the cached token. When it is missing or past its
/// effective expiry, exactly one caller authenticates while the others wait
/// for and then reuse its result.
pub struct CredentialCache {
    api: Arc<dyn DingTalkApi>,
    margin: Duration,
    token: RwLock<Option<Token>>,
}

impl CredentialCache {
    /// Creates an empty cache with the default 60 second refresh margin.
    #[must_use]
    pub fn new(api: Arc<dyn DingTalkApi>) -> Self {
        Self {
            api,
            margin: DEFAULT_REFRESH_MARGIN,
            token: RwLock::new(None),
        }
    }

    /// Sets how long before the platform expiry a token stops being used.
    #[must_use]
    pub const fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Returns a valid access token, authenticating if needed.
    ///
    /// # Errors
    ///
    /// Returns the authentication error, or [`Error::TokenLifetime`] if the
    /// platform issued a token that is not valid by the time it is cached.
    /// Nothing is cached on failure.
    pub async fn get_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_valid()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_valid()) {
            debug!("access token refreshed by a concurrent caller");
            return Ok(token.access_token.clone());
        }

        debug!("fetching access token");
        let grant = self.api.fetch_token().await?;
        let lifetime = grant.lifetime;
        let token = Token::from_grant(grant, self.margin)?;
        info!(
            valid_for_secs = token.remaining().as_secs(),
            "access token refreshed"
        );
        store_fresh(&mut slot, token, lifetime, self.margin)
    }

    /// Drops the cached token so the next caller authenticates again.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }
}

/// Caches a freshly issued token and hands it out only if still valid.
fn store_fresh(
    slot: &mut Option<Token>,
    token: Token,
    lifetime: Duration,
    margin: Duration,
) -> Result<String> {
    let stored = slot.insert(token);
    if !stored.is_valid() {
        *slot = None;
        return Err(Error::TokenLifetime { lifetime, margin });
    }
    Ok(stored.access_token.clone())
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
