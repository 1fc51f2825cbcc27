use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use vibes_core::domain::{
    CategoryTallies, MessageContext, PlaceholderMessage, ReactionCounts, TrackedMessage,
};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const MESSAGE_COLUMNS: &str = "message_ts, channel_id, channel_name, user_id, user_name, \
     avatar_url, content, upvotes, downvotes, yay, sob, heart, star, fire, leek, real, same, \
     skull, eyes, yipee, ping_good, ping_bad, total_reactions, other_reactions, thread_ts, \
     is_thread_reply, parent_content, parent_user_name, is_placeholder, created_at, updated_at";

fn get_text(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_opt_text(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_count(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<i64, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_overflow_map(raw: &str) -> BTreeMap<String, i64> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(crate) fn overflow_map_json(map: &BTreeMap<String, i64>) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<TrackedMessage, RepositoryError> {
    let tallies = CategoryTallies {
        upvotes: get_count(row, "upvotes")?,
        downvotes: get_count(row, "downvotes")?,
        yay: get_count(row, "yay")?,
        sob: get_count(row, "sob")?,
        heart: get_count(row, "heart")?,
        star: get_count(row, "star")?,
        fire: get_count(row, "fire")?,
        leek: get_count(row, "leek")?,
        real: get_count(row, "real")?,
        same: get_count(row, "same")?,
        skull: get_count(row, "skull")?,
        eyes: get_count(row, "eyes")?,
        yipee: get_count(row, "yipee")?,
        ping_good: get_count(row, "ping_good")?,
        ping_bad: get_count(row, "ping_bad")?,
    };

    let other_raw = get_text(row, "other_reactions")?;
    let created_at_raw = get_text(row, "created_at")?;
    let updated_at_raw = get_text(row, "updated_at")?;

    Ok(TrackedMessage {
        message_ts: get_text(row, "message_ts")?,
        channel_id: get_text(row, "channel_id")?,
        channel_name: get_opt_text(row, "channel_name")?,
        author_id: get_text(row, "user_id")?,
        author_name: get_text(row, "user_name")?,
        avatar_url: get_opt_text(row, "avatar_url")?,
        content: get_text(row, "content")?,
        thread_ts: get_opt_text(row, "thread_ts")?,
        is_thread_reply: get_count(row, "is_thread_reply")? != 0,
        parent_content: get_opt_text(row, "parent_content")?,
        parent_author_name: get_opt_text(row, "parent_user_name")?,
        counts: ReactionCounts {
            tallies,
            other: parse_overflow_map(&other_raw),
            total: get_count(row, "total_reactions")?,
        },
        is_placeholder: get_count(row, "is_placeholder")? != 0,
        created_at: parse_timestamp(&created_at_raw),
        updated_at: parse_timestamp(&updated_at_raw),
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn find_by_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<TrackedMessage>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_ts = ?"))
                .bind(message_ts)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_message(r)?)),
            None => Ok(None),
        }
    }

    async fn insert_placeholder(
        &self,
        placeholder: &PlaceholderMessage,
    ) -> Result<bool, RepositoryError> {
        let record = TrackedMessage::placeholder(placeholder, Utc::now());

        let result = sqlx::query(
            "INSERT INTO messages (message_ts, channel_id, user_id, user_name, content, \
                                   thread_ts, is_thread_reply, is_placeholder, \
                                   created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?) \
             ON CONFLICT(message_ts) DO NOTHING",
        )
        .bind(&record.message_ts)
        .bind(&record.channel_id)
        .bind(&record.author_id)
        .bind(&record.author_name)
        .bind(&record.content)
        .bind(&record.thread_ts)
        .bind(record.is_thread_reply as i64)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fill_context(
        &self,
        message_ts: &str,
        context: &MessageContext,
    ) -> Result<(), RepositoryError> {
        // The is_placeholder guard makes the placeholder -> filled transition
        // one-way even under concurrent deliveries.
        sqlx::query(
            "UPDATE messages \
             SET channel_name = ?, user_id = ?, user_name = ?, avatar_url = ?, content = ?, \
                 parent_content = ?, parent_user_name = ?, is_placeholder = 0, updated_at = ? \
             WHERE message_ts = ? AND is_placeholder = 1",
        )
        .bind(&context.channel_name)
        .bind(&context.author_id)
        .bind(&context.author_name)
        .bind(&context.avatar_url)
        .bind(&context.content)
        .bind(&context.parent_content)
        .bind(&context.parent_author_name)
        .bind(Utc::now().to_rfc3339())
        .bind(message_ts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_author(
        &self,
        message_ts: &str,
        author_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE messages SET user_id = ?, updated_at = ? WHERE message_ts = ?")
            .bind(author_id)
            .bind(Utc::now().to_rfc3339())
            .bind(message_ts)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn replace_counts(
        &self,
        message_ts: &str,
        counts: &ReactionCounts,
    ) -> Result<(), RepositoryError> {
        let t = &counts.tallies;
        sqlx::query(
            "UPDATE messages \
             SET upvotes = ?, downvotes = ?, yay = ?, sob = ?, heart = ?, star = ?, fire = ?, \
                 leek = ?, real = ?, same = ?, skull = ?, eyes = ?, yipee = ?, ping_good = ?, \
                 ping_bad = ?, total_reactions = ?, other_reactions = ?, updated_at = ? \
             WHERE message_ts = ?",
        )
        .bind(t.upvotes)
        .bind(t.downvotes)
        .bind(t.yay)
        .bind(t.sob)
        .bind(t.heart)
        .bind(t.star)
        .bind(t.fire)
        .bind(t.leek)
        .bind(t.real)
        .bind(t.same)
        .bind(t.skull)
        .bind(t.eyes)
        .bind(t.yipee)
        .bind(t.ping_good)
        .bind(t.ping_bad)
        .bind(counts.total)
        .bind(overflow_map_json(&counts.other))
        .bind(Utc::now().to_rfc3339())
        .bind(message_ts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
