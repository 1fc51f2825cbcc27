use chrono::{DateTime, Utc};

use super::counts::ReactionCounts;

/// Sentinels used while a record is still a placeholder. The dashboard
/// renders these verbatim until backfill succeeds.
pub const UNKNOWN_AUTHOR_ID: &str = "unknown";
pub const UNKNOWN_AUTHOR_NAME: &str = "Unknown";
pub const PLACEHOLDER_CONTENT: &str = "Loading...";
pub const UNKNOWN_CHANNEL_NAME: &str = "unknown-channel";

/// A message we track reactions for, keyed by its Slack timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedMessage {
    pub message_ts: String,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub avatar_url: Option<String>,
    pub content: String,
    pub thread_ts: Option<String>,
    pub is_thread_reply: bool,
    pub parent_content: Option<String>,
    pub parent_author_name: Option<String>,
    pub counts: ReactionCounts,
    pub is_placeholder: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedMessage {
    /// True once backfill (or opt-out discovery) has resolved the author.
    pub fn has_known_author(&self) -> bool {
        self.author_id != UNKNOWN_AUTHOR_ID
    }

    /// The record created the instant the first reaction event arrives:
    /// sentinel author/content, zeroed counters, awaiting backfill.
    pub fn placeholder(seed: &PlaceholderMessage, now: DateTime<Utc>) -> Self {
        Self {
            message_ts: seed.message_ts.clone(),
            channel_id: seed.channel_id.clone(),
            channel_name: None,
            author_id: UNKNOWN_AUTHOR_ID.to_string(),
            author_name: UNKNOWN_AUTHOR_NAME.to_string(),
            avatar_url: None,
            content: PLACEHOLDER_CONTENT.to_string(),
            thread_ts: seed.thread_ts.clone(),
            is_thread_reply: seed.is_thread_reply(),
            parent_content: None,
            parent_author_name: None,
            counts: ReactionCounts::zero(),
            is_placeholder: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The minimal row inserted the instant the first reaction event arrives,
/// before any upstream fetches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderMessage {
    pub message_ts: String,
    pub channel_id: String,
    pub thread_ts: Option<String>,
}

impl PlaceholderMessage {
    /// A thread hint equal to the message's own timestamp means this is the
    /// thread parent, not a reply.
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|thread_ts| thread_ts != self.message_ts)
    }
}

/// Everything backfill resolves for a placeholder record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageContext {
    pub channel_name: String,
    pub author_id: String,
    pub author_name: String,
    pub avatar_url: Option<String>,
    pub content: String,
    pub parent_content: Option<String>,
    pub parent_author_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::PlaceholderMessage;

    fn placeholder(thread_ts: Option<&str>) -> PlaceholderMessage {
        PlaceholderMessage {
            message_ts: "1730000000.2000".to_string(),
            channel_id: "C1".to_string(),
            thread_ts: thread_ts.map(str::to_string),
        }
    }

    #[test]
    fn thread_hint_differing_from_own_ts_marks_a_reply() {
        assert!(placeholder(Some("1730000000.1000")).is_thread_reply());
    }

    #[test]
    fn own_ts_as_thread_hint_is_not_a_reply() {
        assert!(!placeholder(Some("1730000000.2000")).is_thread_reply());
        assert!(!placeholder(None).is_thread_reply());
    }
}
