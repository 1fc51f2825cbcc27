//! Shared fixtures for router tests: in-memory repositories, a canned
//! gateway, and an `AppState` wired the way bootstrap wires the real one.

use std::sync::Arc;

use async_trait::async_trait;

use vibes_db::repositories::{
    InMemoryMessageRepository, InMemoryOptOutRepository, InMemoryPriorityChannelRepository,
    InMemoryReactionEventRepository, InMemoryUserStatsRepository,
};
use vibes_ingest::ReactionPipeline;
use vibes_slack::api::{MessageSnapshot, ReactionTally, SlackApiError, UserProfile, WebApiClient};
use vibes_slack::gateway::SlackGateway;
use vibes_slack::pool::{CredentialPool, RetryPolicy};

use crate::state::AppState;

pub const SECRET: &str = "test-signing-secret";

/// Gateway with canned answers: every message exists, every user resolves.
pub struct CannedGateway;

#[async_trait]
impl SlackGateway for CannedGateway {
    async fn history_message(
        &self,
        _channel: &str,
        ts: &str,
    ) -> Result<Option<MessageSnapshot>, SlackApiError> {
        Ok(Some(MessageSnapshot {
            ts: ts.to_string(),
            user: Some("U-author".to_string()),
            text: Some("a fine message".to_string()),
            thread_ts: None,
        }))
    }

    async fn thread_messages(
        &self,
        _channel: &str,
        _thread_ts: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        Ok(Vec::new())
    }

    async fn reaction_tallies(
        &self,
        _channel: &str,
        _ts: &str,
    ) -> Result<Vec<ReactionTally>, SlackApiError> {
        Ok(vec![ReactionTally {
            name: "upvote".to_string(),
            count: 1,
            users: vec!["U1".to_string()],
        }])
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError> {
        Ok(UserProfile {
            display_name: Some(format!("{user_id}-name")),
            username: Some(user_id.to_string()),
            avatar_url: None,
        })
    }

    async fn channel_name(&self, _channel: &str) -> Result<Option<String>, SlackApiError> {
        Ok(Some("lounge".to_string()))
    }

    async fn join_channel(&self, _channel: &str) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        _channel: &str,
        _user_id: &str,
        _text: &str,
    ) -> Result<(), SlackApiError> {
        Ok(())
    }
}

pub struct TestFixtures {
    pub messages: Arc<InMemoryMessageRepository>,
    pub user_stats: Arc<InMemoryUserStatsRepository>,
    pub events: Arc<InMemoryReactionEventRepository>,
    pub opt_outs: Arc<InMemoryOptOutRepository>,
    pub priority_channels: Arc<InMemoryPriorityChannelRepository>,
}

pub async fn test_state() -> (AppState, TestFixtures) {
    let messages = Arc::new(InMemoryMessageRepository::default());
    let user_stats = Arc::new(InMemoryUserStatsRepository::default());
    let events = Arc::new(InMemoryReactionEventRepository::default());
    let opt_outs = Arc::new(InMemoryOptOutRepository::default());
    let priority_channels = Arc::new(InMemoryPriorityChannelRepository::default());
    let gateway = Arc::new(CannedGateway);

    let pipeline = Arc::new(ReactionPipeline::new(
        messages.clone(),
        user_stats.clone(),
        events.clone(),
        opt_outs.clone(),
        gateway.clone(),
    ));

    let credential_pool = Arc::new(CredentialPool::new(
        vec![WebApiClient::new("history-1", "xoxb-test".to_string().into())],
        None,
        RetryPolicy::default(),
    ));

    let db_pool = vibes_db::connect("sqlite::memory:").await.expect("test pool");

    let state = AppState {
        signing_secret: SECRET.to_string().into(),
        pipeline,
        gateway,
        opt_outs: opt_outs.clone(),
        priority_channels: priority_channels.clone(),
        credential_pool,
        db_pool,
    };

    let fixtures = TestFixtures { messages, user_stats, events, opt_outs, priority_channels };
    (state, fixtures)
}
