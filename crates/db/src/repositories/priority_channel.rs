use chrono::Utc;
use sqlx::Row;

use super::{PriorityChannelRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPriorityChannelRepository {
    pool: DbPool,
}

impl SqlPriorityChannelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PriorityChannelRepository for SqlPriorityChannelRepository {
    async fn list_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT channel_id FROM priority_channels ORDER BY channel_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("channel_id")).collect())
    }

    async fn insert_if_absent(
        &self,
        channel_id: &str,
        channel_name: &str,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO priority_channels (channel_id, channel_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(channel_id) DO NOTHING",
        )
        .bind(channel_id)
        .bind(channel_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::SqlPriorityChannelRepository;
    use crate::repositories::PriorityChannelRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlPriorityChannelRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlPriorityChannelRepository::new(pool)
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let repo = setup().await;

        assert!(repo.insert_if_absent("C1", "lounge").await.expect("first"));
        assert!(!repo.insert_if_absent("C1", "lounge").await.expect("second"));
        assert!(repo.insert_if_absent("C2", "ship").await.expect("other channel"));

        assert_eq!(repo.list_ids().await.expect("list"), vec!["C1", "C2"]);
    }
}
