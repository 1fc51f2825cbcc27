use async_trait::async_trait;
use thiserror::Error;

use vibes_core::domain::{
    MessageContext, NewReactionEvent, PlaceholderMessage, ReactionCounts, ReactionEventRecord,
    TrackedMessage, UserStats,
};

pub mod memory;
pub mod message;
pub mod opt_out;
pub mod priority_channel;
pub mod reaction_event;
pub mod user_stats;

pub use memory::{
    InMemoryMessageRepository, InMemoryOptOutRepository, InMemoryPriorityChannelRepository,
    InMemoryReactionEventRepository, InMemoryUserStatsRepository,
};
pub use message::SqlMessageRepository;
pub use opt_out::SqlOptOutRepository;
pub use priority_channel::SqlPriorityChannelRepository;
pub use reaction_event::SqlReactionEventRepository;
pub use user_stats::SqlUserStatsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Tracked-message records, keyed by Slack message timestamp.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<TrackedMessage>, RepositoryError>;

    /// Insert-if-absent. Returns `false` when another delivery already
    /// created the row (the uniqueness race is expected, not an error).
    async fn insert_placeholder(
        &self,
        placeholder: &PlaceholderMessage,
    ) -> Result<bool, RepositoryError>;

    /// Populate author/content/channel fields and clear the placeholder
    /// flag. Guarded so the flag can only ever flip true -> false.
    async fn fill_context(
        &self,
        message_ts: &str,
        context: &MessageContext,
    ) -> Result<(), RepositoryError>;

    /// Record a resolved author id on a row that stays a placeholder
    /// (opt-out discovered during backfill).
    async fn record_author(&self, message_ts: &str, author_id: &str)
        -> Result<(), RepositoryError>;

    /// Full-replace of every counter, the overflow map, and the total.
    async fn replace_counts(
        &self,
        message_ts: &str,
        counts: &ReactionCounts,
    ) -> Result<(), RepositoryError>;
}

/// Per-user given-reaction counters.
#[async_trait]
pub trait UserStatsRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<UserStats>, RepositoryError>;

    /// Returns `false` when a row for the user already exists.
    async fn insert_if_absent(&self, stats: &UserStats) -> Result<bool, RepositoryError>;

    /// Atomic insert-or-update of the full row.
    async fn save(&self, stats: &UserStats) -> Result<(), RepositoryError>;
}

/// Append-only audit log of raw reaction deliveries (duplicates included).
#[async_trait]
pub trait ReactionEventRepository: Send + Sync {
    async fn append(&self, event: &NewReactionEvent) -> Result<(), RepositoryError>;

    async fn list_for_message(
        &self,
        message_ts: &str,
    ) -> Result<Vec<ReactionEventRecord>, RepositoryError>;
}

/// Users whose authored messages are excluded from aggregation.
#[async_trait]
pub trait OptOutRepository: Send + Sync {
    async fn contains(&self, user_id: &str) -> Result<bool, RepositoryError>;
    async fn insert(&self, user_id: &str) -> Result<(), RepositoryError>;
    async fn remove(&self, user_id: &str) -> Result<(), RepositoryError>;
}

/// Channels for which the priority credential is preferred.
#[async_trait]
pub trait PriorityChannelRepository: Send + Sync {
    async fn list_ids(&self) -> Result<Vec<String>, RepositoryError>;

    /// Returns `false` when the channel was already registered.
    async fn insert_if_absent(
        &self,
        channel_id: &str,
        channel_name: &str,
    ) -> Result<bool, RepositoryError>;
}
