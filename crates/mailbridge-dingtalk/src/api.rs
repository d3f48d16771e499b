//! Platform operations and their wire types.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The three DingTalk open API calls the bridge needs.
///
/// [`crate::Client`] implements this over HTTP. Callers hold it as
/// `Arc<dyn DingTalkApi>` so tests can substitute an in-memory platform.
#[async_trait]
pub trait DingTalkApi: Send + Sync {
    /// Exchanges the application credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or platform rejection.
    async fn fetch_token(&self) -> Result<TokenGrant>;

    /// Looks up the platform user id registered for a mobile number.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or if no user matches.
    async fn user_id_by_mobile(&self, access_token: &str, mobile: &str) -> Result<String>;

    /// Sends one Markdown work notification to every listed user.
    ///
    /// Returns the platform task id.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or platform rejection.
    async fn send_markdown(
        &self,
        access_token: &str,
        user_ids: &[String],
        message: &MarkdownMessage,
    ) -> Result<i64>;
}

/// An access token as issued by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Token value.
    pub access_token: String,
    /// Lifetime from the moment of issue.
    pub lifetime: Duration,
}

/// A Markdown work notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownMessage {
    /// Title shown in the conversation list.
    pub title: String,
    /// Markdown body.
    pub text: String,
}

impl MarkdownMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// `errcode`/`errmsg` pair present on every response.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl Status {
    pub(crate) fn into_result(self) -> Result<()> {
        if self.errcode == 0 {
            Ok(())
        } else {
            Err(Error::api_error(self.errcode, self.errmsg))
        }
    }
}

/// `GET /gettoken` response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl TokenResponse {
    pub(crate) fn into_grant(self) -> Result<TokenGrant> {
        self.status.into_result()?;
        if self.access_token.is_empty() {
            return Err(Error::InvalidResponse("missing access_token".to_string()));
        }
        Ok(TokenGrant {
            access_token: self.access_token,
            lifetime: Duration::from_secs(self.expires_in),
        })
    }
}

/// `POST /topapi/v2/user/getbymobile` request.
#[derive(Debug, Serialize)]
pub(crate) struct UserByMobileRequest<'a> {
    pub mobile: &'a str,
}

/// `POST /topapi/v2/user/getbymobile` response.
#[derive(Debug, Deserialize)]
pub(crate) struct UserByMobileResponse {
    #[serde(flatten)]
    pub status: Status,
    pub result: Option<UserByMobileResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserByMobileResult {
    #[serde(default)]
    pub userid: String,
}

impl UserByMobileResponse {
    pub(crate) fn into_user_id(self) -> Result<String> {
        self.status.into_result()?;
        self.result
            .map(|r| r.userid)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidResponse("missing result.userid".to_string()))
    }
}

/// `POST /topapi/message/corpconversation/asyncsend_v2` request.
#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    pub agent_id: i64,
    /// Comma-separated user ids.
    pub userid_list: String,
    pub msg: SendMessage<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    pub msgtype: &'static str,
    pub markdown: &'a MarkdownMessage,
}

impl<'a> SendRequest<'a> {
    pub(crate) fn markdown(agent_id: i64, user_ids: &[String], message: &'a MarkdownMessage) -> Self {
        Self {
            agent_id,
            userid_list: user_ids.join(","),
            msg: SendMessage {
                msgtype: "markdown",
                markdown: message,
            },
        }
    }
}

/// `POST /topapi/message/corpconversation/asyncsend_v2` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SendResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub task_id: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_success() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"errcode":0,"errmsg":"ok","access_token":"abc","expires_in":7200}"#,
        )
        .unwrap();
        let grant = response.into_grant().unwrap();
        assert_eq!(grant.access_token, "abc");
        assert_eq!(grant.lifetime, Duration::from_secs(7200));
    }

    #[test]
    fn test_token_response_rejected() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"errcode":40089,"errmsg":"invalid appkey"}"#).unwrap();
        match response.into_grant() {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 40089);
                assert_eq!(message, "invalid appkey");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_token_response_missing_token() {
        let response: TokenResponse = serde_json::from_str(r#"{"errcode":0}"#).unwrap();
        assert!(matches!(
            response.into_grant(),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_user_by_mobile_response() {
        let response: UserByMobileResponse = serde_json::from_str(
            r#"{"errcode":0,"errmsg":"ok","result":{"userid":"u1"},"request_id":"x"}"#,
        )
        .unwrap();
        assert_eq!(response.into_user_id().unwrap(), "u1");

        let missing: UserByMobileResponse =
            serde_json::from_str(r#"{"errcode":60121,"errmsg":"user not found"}"#).unwrap();
        assert!(matches!(
            missing.into_user_id(),
            Err(Error::Api { code: 60121, .. })
        ));
    }

    #[test]
    fn test_send_request_shape() {
        let message = MarkdownMessage::new("Alert", "## Alert\n\nbody");
        let ids = vec!["u1".to_string(), "u2".to_string()];
        let request = SendRequest::markdown(42, &ids, &message);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "agent_id": 42,
                "userid_list": "u1,u2",
                "msg": {
                    "msgtype": "markdown",
                    "markdown": {"title": "Alert", "text": "## Alert\n\nbody"}
                }
            })
        );
    }
}
