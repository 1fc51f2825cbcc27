use sqlx::Row;

use super::{OptOutRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOptOutRepository {
    pool: DbPool,
}

impl SqlOptOutRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OptOutRepository for SqlOptOutRepository {
    async fn contains(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM opted_out_users WHERE slack_user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("count");

        Ok(count > 0)
    }

    async fn insert(&self, user_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO opted_out_users (slack_user_id) VALUES (?) \
             ON CONFLICT(slack_user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM opted_out_users WHERE slack_user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqlOptOutRepository;
    use crate::repositories::OptOutRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlOptOutRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlOptOutRepository::new(pool)
    }

    #[tokio::test]
    async fn insert_contains_remove_cycle() {
        let repo = setup().await;

        assert!(!repo.contains("U1").await.expect("empty"));
        repo.insert("U1").await.expect("insert");
        repo.insert("U1").await.expect("idempotent insert");
        assert!(repo.contains("U1").await.expect("present"));

        repo.remove("U1").await.expect("remove");
        assert!(!repo.contains("U1").await.expect("absent again"));
    }
}
