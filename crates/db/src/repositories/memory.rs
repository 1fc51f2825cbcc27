use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;

use vibes_core::domain::{
    MessageContext, NewReactionEvent, PlaceholderMessage, ReactionCounts, ReactionEventRecord,
    TrackedMessage, UserStats,
};

use super::{
    MessageRepository, OptOutRepository, PriorityChannelRepository, ReactionEventRepository,
    RepositoryError, UserStatsRepository,
};

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<String, TrackedMessage>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn find_by_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<TrackedMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.get(message_ts).cloned())
    }

    async fn insert_placeholder(
        &self,
        placeholder: &PlaceholderMessage,
    ) -> Result<bool, RepositoryError> {
        let mut messages = self.messages.write().await;
        if messages.contains_key(&placeholder.message_ts) {
            return Ok(false);
        }
        messages.insert(
            placeholder.message_ts.clone(),
            TrackedMessage::placeholder(placeholder, Utc::now()),
        );
        Ok(true)
    }

    async fn fill_context(
        &self,
        message_ts: &str,
        context: &MessageContext,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        if let Some(message) = messages.get_mut(message_ts) {
            if message.is_placeholder {
                message.channel_name = Some(context.channel_name.clone());
                message.author_id = context.author_id.clone();
                message.author_name = context.author_name.clone();
                message.avatar_url = context.avatar_url.clone();
                message.content = context.content.clone();
                message.parent_content = context.parent_content.clone();
                message.parent_author_name = context.parent_author_name.clone();
                message.is_placeholder = false;
                message.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn record_author(
        &self,
        message_ts: &str,
        author_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        if let Some(message) = messages.get_mut(message_ts) {
            message.author_id = author_id.to_string();
            message.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_counts(
        &self,
        message_ts: &str,
        counts: &ReactionCounts,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        if let Some(message) = messages.get_mut(message_ts) {
            message.counts = counts.clone();
            message.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserStatsRepository {
    stats: RwLock<HashMap<String, UserStats>>,
}

#[async_trait::async_trait]
impl UserStatsRepository for InMemoryUserStatsRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<UserStats>, RepositoryError> {
        let stats = self.stats.read().await;
        Ok(stats.get(user_id).cloned())
    }

    async fn insert_if_absent(&self, stats: &UserStats) -> Result<bool, RepositoryError> {
        let mut guard = self.stats.write().await;
        if guard.contains_key(&stats.user_id) {
            return Ok(false);
        }
        guard.insert(stats.user_id.clone(), stats.clone());
        Ok(true)
    }

    async fn save(&self, stats: &UserStats) -> Result<(), RepositoryError> {
        let mut guard = self.stats.write().await;
        guard.insert(stats.user_id.clone(), stats.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryReactionEventRepository {
    events: RwLock<Vec<ReactionEventRecord>>,
}

#[async_trait::async_trait]
impl ReactionEventRepository for InMemoryReactionEventRepository {
    async fn append(&self, event: &NewReactionEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        let id = events.len() as i64 + 1;
        events.push(ReactionEventRecord {
            id,
            message_ts: event.message_ts.clone(),
            channel_id: event.channel_id.clone(),
            user_id: event.user_id.clone(),
            reaction_name: event.reaction_name.clone(),
            kind: event.kind,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_message(
        &self,
        message_ts: &str,
    ) -> Result<Vec<ReactionEventRecord>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| event.message_ts == message_ts).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryOptOutRepository {
    users: RwLock<HashSet<String>>,
}

#[async_trait::async_trait]
impl OptOutRepository for InMemoryOptOutRepository {
    async fn contains(&self, user_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.users.read().await.contains(user_id))
    }

    async fn insert(&self, user_id: &str) -> Result<(), RepositoryError> {
        self.users.write().await.insert(user_id.to_string());
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<(), RepositoryError> {
        self.users.write().await.remove(user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPriorityChannelRepository {
    channels: RwLock<HashMap<String, String>>,
}

#[async_trait::async_trait]
impl PriorityChannelRepository for InMemoryPriorityChannelRepository {
    async fn list_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let channels = self.channels.read().await;
        let mut ids: Vec<String> = channels.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_if_absent(
        &self,
        channel_id: &str,
        channel_name: &str,
    ) -> Result<bool, RepositoryError> {
        let mut channels = self.channels.write().await;
        if channels.contains_key(channel_id) {
            return Ok(false);
        }
        channels.insert(channel_id.to_string(), channel_name.to_string());
        Ok(true)
    }
}
