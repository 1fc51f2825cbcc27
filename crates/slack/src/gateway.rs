//! The upstream seam the ingestion pipeline consumes.
//!
//! `SlackGateway` keeps the pipeline testable against fakes; the real
//! implementation routes the four read calls through the credential pool and
//! uses the bot credential for join/ephemeral writes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{MessageSnapshot, ReactionTally, SlackApiError, UserProfile, WebApiClient};
use crate::pool::CredentialPool;

#[async_trait]
pub trait SlackGateway: Send + Sync {
    /// The message at `ts` in a channel, if visible.
    async fn history_message(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Option<MessageSnapshot>, SlackApiError>;

    /// All messages of a thread (parent first, per the upstream contract).
    async fn thread_messages(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError>;

    /// Authoritative reaction list for one message.
    async fn reaction_tallies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<ReactionTally>, SlackApiError>;

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError>;

    async fn channel_name(&self, channel: &str) -> Result<Option<String>, SlackApiError>;

    async fn join_channel(&self, channel: &str) -> Result<(), SlackApiError>;

    async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), SlackApiError>;
}

pub struct CyclingSlackGateway {
    pool: Arc<CredentialPool>,
    bot: WebApiClient,
}

impl CyclingSlackGateway {
    pub fn new(pool: Arc<CredentialPool>, bot: WebApiClient) -> Self {
        Self { pool, bot }
    }
}

#[async_trait]
impl SlackGateway for CyclingSlackGateway {
    async fn history_message(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Option<MessageSnapshot>, SlackApiError> {
        let messages = self.pool.fetch_history(channel, ts).await?;
        Ok(messages.into_iter().find(|message| message.ts == ts))
    }

    async fn thread_messages(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<MessageSnapshot>, SlackApiError> {
        self.pool.fetch_replies(channel, thread_ts).await
    }

    async fn reaction_tallies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<ReactionTally>, SlackApiError> {
        self.pool
            .execute(Some(channel), |client| {
                let channel = channel.to_owned();
                let ts = ts.to_owned();
                async move { client.reactions_get(&channel, &ts).await }
            })
            .await
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError> {
        self.pool
            .execute(None, |client| {
                let user_id = user_id.to_owned();
                async move { client.users_info(&user_id).await }
            })
            .await
    }

    async fn channel_name(&self, channel: &str) -> Result<Option<String>, SlackApiError> {
        let info = self
            .pool
            .execute(Some(channel), |client| {
                let channel = channel.to_owned();
                async move { client.conversations_info(&channel).await }
            })
            .await?;
        Ok(info.name)
    }

    async fn join_channel(&self, channel: &str) -> Result<(), SlackApiError> {
        self.bot.conversations_join(channel).await
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.bot.chat_post_ephemeral(channel, user_id, text).await
    }
}
