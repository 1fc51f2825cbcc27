use chrono::Utc;
use sqlx::Row;

use vibes_core::domain::{NewReactionEvent, ReactionEventKind, ReactionEventRecord};

use super::message::parse_timestamp;
use super::{ReactionEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlReactionEventRepository {
    pool: DbPool,
}

impl SqlReactionEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ReactionEventRecord, RepositoryError> {
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind = ReactionEventKind::parse(&event_type)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown event_type `{event_type}`")))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ReactionEventRecord {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        message_ts: row.try_get("message_ts").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        channel_id: row.try_get("channel_id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        user_id: row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        reaction_name: row
            .try_get("reaction_name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        kind,
        created_at: parse_timestamp(&created_at_raw),
    })
}

#[async_trait::async_trait]
impl ReactionEventRepository for SqlReactionEventRepository {
    async fn append(&self, event: &NewReactionEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO reaction_events (message_ts, channel_id, user_id, reaction_name, \
                                          event_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.message_ts)
        .bind(&event.channel_id)
        .bind(&event.user_id)
        .bind(&event.reaction_name)
        .bind(event.kind.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_message(
        &self,
        message_ts: &str,
    ) -> Result<Vec<ReactionEventRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, message_ts, channel_id, user_id, reaction_name, event_type, created_at \
             FROM reaction_events WHERE message_ts = ? ORDER BY id ASC",
        )
        .bind(message_ts)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }
}
