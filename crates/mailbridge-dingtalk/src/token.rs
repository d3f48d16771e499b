//! Cached access token with an effective expiry.

use crate::api::TokenGrant;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Refresh margin applied to every issued token.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// An access token together with the instant it stops being handed out.
#[derive(Debug, Clone)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Effective expiry: issue time plus lifetime minus the refresh margin.
    pub expires_at: Instant,
}

impl Token {
    /// Creates a token from a platform grant received just now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenLifetime`] if the granted lifetime does not
    /// exceed `margin`, since such a token would be expired on arrival.
    pub fn from_grant(grant: TokenGrant, margin: Duration) -> Result<Self> {
        let Some(effective) = grant.lifetime.checked_sub(margin).filter(|d| !d.is_zero()) else {
            return Err(Error::TokenLifetime {
                lifetime: grant.lifetime,
                margin,
            });
        };

        Ok(Self {
            access_token: grant.access_token,
            expires_at: Instant::now() + effective,
        })
    }

    /// Checks if the effective expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Returns true if the token can still be handed out.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// Time left before the effective expiry.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
