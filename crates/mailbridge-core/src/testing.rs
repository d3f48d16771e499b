//! In-memory platform for unit tests.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use mailbridge_dingtalk::{DingTalkApi, Error, MarkdownMessage, Result, TokenGrant};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Platform with a fixed user directory that records every call.
#[derive(Default)]
pub struct FakePlatform {
    /// Mobile number to user id.
    pub users: HashMap<String, String>,
    /// Batches containing any of these user ids are rejected.
    pub rejected: HashSet<String>,
    /// When set, authentication fails.
    pub deny_auth: AtomicBool,
    pub token_calls: AtomicUsize,
    pub lookups: Mutex<Vec<String>>,
    pub sends: Mutex<Vec<(Vec<String>, MarkdownMessage)>>,
}

impl FakePlatform {
    pub fn with_users(users: &[(&str, &str)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(mobile, id)| ((*mobile).to_string(), (*id).to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn sent_batches(&self) -> Vec<Vec<String>> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(ids, _)| ids.clone())
            .collect()
    }
}

#[async_trait]
impl DingTalkApi for FakePlatform {
    async fn fetch_token(&self) -> Result<TokenGrant> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_auth.load(Ordering::SeqCst) {
            return Err(Error::api_error(40089, "invalid appkey or appsecret"));
        }
        Ok(TokenGrant {
            access_token: "token-1".to_string(),
            lifetime: Duration::from_secs(7200),
        })
    }

    async fn user_id_by_mobile(&self, access_token: &str, mobile: &str) -> Result<String> {
        assert_eq!(access_token, "token-1");
        self.lookups.lock().unwrap().push(mobile.to_string());
        self.users
            .get(mobile)
            .cloned()
            .ok_or_else(|| Error::api_error(60121, "user not found"))
    }

    async fn send_markdown(
        &self,
        access_token: &str,
        user_ids: &[String],
        message: &MarkdownMessage,
    ) -> Result<i64> {
        assert_eq!(access_token, "token-1");
        self.sends
            .lock()
            .unwrap()
            .push((user_ids.to_vec(), message.clone()));
        if user_ids.iter().any(|id| self.rejected.contains(id)) {
            return Err(Error::api_error(33012, "invalid userid"));
        }
        Ok(1)
    }
}
