//! HTTP client for the DingTalk open API.

use crate::api::{
    DingTalkApi, MarkdownMessage, SendRequest, SendResponse, TokenGrant, TokenResponse,
    UserByMobileRequest, UserByMobileResponse,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://oapi.dingtalk.com";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body quoted in a status error.
const MAX_ERROR_BODY: usize = 512;

/// Application credentials for one DingTalk internal app.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// App key.
    pub app_key: String,
    /// App secret.
    pub app_secret: String,
    /// Agent id the work notifications are sent as.
    pub agent_id: i64,
}

/// DingTalk open API client.
#[derive(Debug, Clone)]
pub struct Client {
    credentials: Credentials,
    base_url: Url,
    http_client: reqwest::Client,
}

impl Client {
    /// Creates a client against the production API host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            credentials,
            base_url: normalize_base(Url::parse(DEFAULT_BASE_URL)?),
            http_client,
        })
    }

    /// Points the client at another API host.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        self.base_url = normalize_base(Url::parse(base_url.as_ref())?);
        Ok(self)
    }

    /// Returns the API host in use.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, access_token: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if let Some(token) = access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DingTalkApi for Client {
    async fn fetch_token(&self) -> Result<TokenGrant> {
        let mut url = self.endpoint("gettoken", None)?;
        url.query_pairs_mut()
            .append_pair("appkey", &self.credentials.app_key)
            .append_pair("appsecret", &self.credentials.app_secret);

        debug!("requesting access token");
        let response = self.http_client.get(url).send().await?;
        Self::read_json::<TokenResponse>(response)
            .await?
            .into_grant()
    }

    async fn user_id_by_mobile(&self, access_token: &str, mobile: &str) -> Result<String> {
        let url = self.endpoint("topapi/v2/user/getbymobile", Some(access_token))?;

        debug!("looking up user by mobile");
        let response = self
            .http_client
            .post(url)
            .json(&UserByMobileRequest { mobile })
            .send()
            .await?;
        Self::read_json::<UserByMobileResponse>(response)
            .await?
            .into_user_id()
    }

    async fn send_markdown(
        &self,
        access_token: &str,
        user_ids: &[String],
        message: &MarkdownMessage,
    ) -> Result<i64> {
        let url = self.endpoint(
            "topapi/message/corpconversation/asyncsend_v2",
            Some(access_token),
        )?;
        let request = SendRequest::markdown(self.credentials.agent_id, user_ids, message);

        debug!(recipients = user_ids.len(), "sending work notification");
        let response = self.http_client.post(url).json(&request).send().await?;
        let response: SendResponse = Self::read_json(response).await?;
        response.status.into_result()?;
        Ok(response.task_id)
    }
}

/// Ensures the base path ends with `/` so relative joins append to it.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
