//! One-credential Slack Web API client.
//!
//! Each method issues a single request with one token and reports failures in
//! a form the credential pool can act on: rate limits (with the retry-after
//! hint when Slack provides one) are distinguished from every other error.
//! The error type is `Clone` so a result can be fanned out to all waiters of
//! a de-duplicated in-flight call.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const API_BASE: &str = "https://slack.com/api";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("slack api error: {code}")]
    Api { code: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("malformed response: {message}")]
    Malformed { message: String },
    #[error("no credentials configured")]
    NoCredentials,
    #[error("all credentials exhausted after {rounds} rounds")]
    Exhausted { rounds: u32 },
}

impl SlackApiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// One message as returned by history/replies fetches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageSnapshot {
    pub ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
}

/// One reaction row from the authoritative reaction list: raw name, raw
/// count, and the reacting users.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReactionTally {
    pub name: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to the account name, falling back to the
    /// literal `Unknown`.
    pub fn resolved_name(&self) -> String {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.username.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: Option<String>,
}

pub struct WebApiClient {
    label: String,
    token: SecretString,
    http: reqwest::Client,
}

impl WebApiClient {
    pub fn new(label: impl Into<String>, token: SecretString) -> Self {
        Self { label: label.into(), token, http: reqwest::Client::new() }
    }

    /// Identifier used in logs ("history-2", "priority", "bot").
    pub fn label(&self) -> &str {
        &self.label
    }

    async fn call(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, SlackApiError> {
        let response = self
            .http
            .post(format!("{API_BASE}/{method}"))
            .bearer_auth(self.token.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { message: error.to_string() })?;

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(SlackApiError::RateLimited { retry_after });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|error| SlackApiError::Malformed { message: error.to_string() })?;

        if payload.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let code = payload
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            if code == "ratelimited" {
                return Err(SlackApiError::RateLimited { retry_after });
            }
            return Err(SlackApiError::Api { code });
        }

        Ok(payload)
    }

    /// Channel history anchored at a timestamp (inclusive, limit 1).
    pub async fn conversations_history(
        &self,
        channel: &str,
        latest: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        let payload = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("latest", latest.to_string()),
                    ("limit", "1".to_string()),
                    ("inclusive", "true".to_string()),
                ],
            )
            .await?;

        parse_messages(payload)
    }

    pub async fn conversations_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        let payload = self
            .call(
                "conversations.replies",
                &[("channel", channel.to_string()), ("ts", thread_ts.to_string())],
            )
            .await?;

        parse_messages(payload)
    }

    /// Authoritative reaction list for one message. A message with no
    /// reactions comes back as an empty list.
    pub async fn reactions_get(
        &self,
        channel: &str,
        timestamp: &str,
    ) -> Result<Vec<ReactionTally>, SlackApiError> {
        let payload = self
            .call(
                "reactions.get",
                &[("channel", channel.to_string()), ("timestamp", timestamp.to_string())],
            )
            .await?;

        let reactions = payload
            .get("message")
            .and_then(|message| message.get("reactions"))
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));

        serde_json::from_value(reactions)
            .map_err(|error| SlackApiError::Malformed { message: error.to_string() })
    }

    pub async fn users_info(&self, user_id: &str) -> Result<UserProfile, SlackApiError> {
        let payload = self.call("users.info", &[("user", user_id.to_string())]).await?;

        let user = payload
            .get("user")
            .ok_or_else(|| SlackApiError::Malformed { message: "missing user".to_string() })?;
        let profile = user.get("profile");

        Ok(UserProfile {
            display_name: profile
                .and_then(|profile| profile.get("display_name"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            username: user.get("name").and_then(serde_json::Value::as_str).map(str::to_string),
            avatar_url: profile
                .and_then(|profile| profile.get("image_72"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        })
    }

    pub async fn conversations_info(&self, channel: &str) -> Result<ChannelInfo, SlackApiError> {
        let payload =
            self.call("conversations.info", &[("channel", channel.to_string())]).await?;

        Ok(ChannelInfo {
            name: payload
                .get("channel")
                .and_then(|channel| channel.get("name"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        })
    }

    pub async fn conversations_join(&self, channel: &str) -> Result<(), SlackApiError> {
        self.call("conversations.join", &[("channel", channel.to_string())]).await?;
        Ok(())
    }

    pub async fn chat_post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.call(
            "chat.postEphemeral",
            &[
                ("channel", channel.to_string()),
                ("user", user_id.to_string()),
                ("text", text.to_string()),
            ],
        )
        .await?;
        Ok(())
    }
}

fn parse_messages(payload: serde_json::Value) -> Result<Vec<MessageSnapshot>, SlackApiError> {
    let messages = payload
        .get("messages")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));

    serde_json::from_value(messages)
        .map_err(|error| SlackApiError::Malformed { message: error.to_string() })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_messages, ReactionTally, SlackApiError, UserProfile};

    #[test]
    fn resolved_name_prefers_display_name() {
        let profile = UserProfile {
            display_name: Some("orpheus".to_string()),
            username: Some("orpheus-acct".to_string()),
            avatar_url: None,
        };
        assert_eq!(profile.resolved_name(), "orpheus");
    }

    #[test]
    fn resolved_name_falls_back_through_account_name_to_unknown() {
        let profile = UserProfile {
            display_name: Some(String::new()),
            username: Some("orpheus-acct".to_string()),
            avatar_url: None,
        };
        assert_eq!(profile.resolved_name(), "orpheus-acct");

        assert_eq!(UserProfile::default().resolved_name(), "Unknown");
    }

    #[test]
    fn message_lists_parse_with_optional_fields() {
        let messages = parse_messages(json!({
            "ok": true,
            "messages": [
                {"ts": "100.1", "user": "U1", "text": "hi"},
                {"ts": "100.2"}
            ]
        }))
        .expect("parse");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].user.as_deref(), Some("U1"));
        assert!(messages[1].user.is_none());
    }

    #[test]
    fn missing_messages_key_is_an_empty_list() {
        assert!(parse_messages(json!({"ok": true})).expect("parse").is_empty());
    }

    #[test]
    fn reaction_tallies_deserialize_with_defaults() {
        let tallies: Vec<ReactionTally> = serde_json::from_value(json!([
            {"name": "upvote", "count": 2, "users": ["U1", "U2"]},
            {"name": "fire"}
        ]))
        .expect("parse");

        assert_eq!(tallies[0].users.len(), 2);
        assert_eq!(tallies[1].count, 0);
        assert!(tallies[1].users.is_empty());
    }

    #[test]
    fn rate_limit_errors_are_distinguishable() {
        assert!(SlackApiError::RateLimited { retry_after: None }.is_rate_limit());
        assert!(!SlackApiError::Api { code: "channel_not_found".to_string() }.is_rate_limit());
    }
}
