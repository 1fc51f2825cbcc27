use chrono::Utc;
use sqlx::Row;

use vibes_core::domain::{CategoryTallies, UserStats};

use super::message::{overflow_map_json, parse_overflow_map, parse_timestamp};
use super::{RepositoryError, UserStatsRepository};
use crate::DbPool;

pub struct SqlUserStatsRepository {
    pool: DbPool,
}

impl SqlUserStatsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const STATS_COLUMNS: &str = "user_id, user_name, avatar_url, given_upvotes, given_downvotes, \
     given_yay, given_sob, given_heart, given_star, given_fire, given_leek, given_real, \
     given_same, given_skull, given_eyes, given_yipee, given_ping_good, given_ping_bad, \
     other_given_reactions, updated_at";

fn get<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    for<'r> T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_stats(row: &sqlx::sqlite::SqliteRow) -> Result<UserStats, RepositoryError> {
    let given = CategoryTallies {
        upvotes: get(row, "given_upvotes")?,
        downvotes: get(row, "given_downvotes")?,
        yay: get(row, "given_yay")?,
        sob: get(row, "given_sob")?,
        heart: get(row, "given_heart")?,
        star: get(row, "given_star")?,
        fire: get(row, "given_fire")?,
        leek: get(row, "given_leek")?,
        real: get(row, "given_real")?,
        same: get(row, "given_same")?,
        skull: get(row, "given_skull")?,
        eyes: get(row, "given_eyes")?,
        yipee: get(row, "given_yipee")?,
        ping_good: get(row, "given_ping_good")?,
        ping_bad: get(row, "given_ping_bad")?,
    };

    let other_raw: String = get(row, "other_given_reactions")?;
    let updated_at_raw: String = get(row, "updated_at")?;

    Ok(UserStats {
        user_id: get(row, "user_id")?,
        user_name: get(row, "user_name")?,
        avatar_url: get(row, "avatar_url")?,
        given,
        other_given: parse_overflow_map(&other_raw),
        updated_at: parse_timestamp(&updated_at_raw),
    })
}

#[async_trait::async_trait]
impl UserStatsRepository for SqlUserStatsRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<UserStats>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {STATS_COLUMNS} FROM user_stats WHERE user_id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_stats(r)?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(&self, stats: &UserStats) -> Result<bool, RepositoryError> {
        let g = &stats.given;
        let result = sqlx::query(
            "INSERT INTO user_stats (user_id, user_name, avatar_url, given_upvotes, \
                 given_downvotes, given_yay, given_sob, given_heart, given_star, given_fire, \
                 given_leek, given_real, given_same, given_skull, given_eyes, given_yipee, \
                 given_ping_good, given_ping_bad, other_given_reactions, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(&stats.user_id)
        .bind(&stats.user_name)
        .bind(&stats.avatar_url)
        .bind(g.upvotes)
        .bind(g.downvotes)
        .bind(g.yay)
        .bind(g.sob)
        .bind(g.heart)
        .bind(g.star)
        .bind(g.fire)
        .bind(g.leek)
        .bind(g.real)
        .bind(g.same)
        .bind(g.skull)
        .bind(g.eyes)
        .bind(g.yipee)
        .bind(g.ping_good)
        .bind(g.ping_bad)
        .bind(overflow_map_json(&stats.other_given))
        .bind(stats.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, stats: &UserStats) -> Result<(), RepositoryError> {
        let g = &stats.given;
        sqlx::query(
            "INSERT INTO user_stats (user_id, user_name, avatar_url, given_upvotes, \
                 given_downvotes, given_yay, given_sob, given_heart, given_star, given_fire, \
                 given_leek, given_real, given_same, given_skull, given_eyes, given_yipee, \
                 given_ping_good, given_ping_bad, other_given_reactions, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
                 user_name = excluded.user_name, \
                 avatar_url = excluded.avatar_url, \
                 given_upvotes = excluded.given_upvotes, \
                 given_downvotes = excluded.given_downvotes, \
                 given_yay = excluded.given_yay, \
                 given_sob = excluded.given_sob, \
                 given_heart = excluded.given_heart, \
                 given_star = excluded.given_star, \
                 given_fire = excluded.given_fire, \
                 given_leek = excluded.given_leek, \
                 given_real = excluded.given_real, \
                 given_same = excluded.given_same, \
                 given_skull = excluded.given_skull, \
                 given_eyes = excluded.given_eyes, \
                 given_yipee = excluded.given_yipee, \
                 given_ping_good = excluded.given_ping_good, \
                 given_ping_bad = excluded.given_ping_bad, \
                 other_given_reactions = excluded.other_given_reactions, \
                 updated_at = excluded.updated_at",
        )
        .bind(&stats.user_id)
        .bind(&stats.user_name)
        .bind(&stats.avatar_url)
        .bind(g.upvotes)
        .bind(g.downvotes)
        .bind(g.yay)
        .bind(g.sob)
        .bind(g.heart)
        .bind(g.star)
        .bind(g.fire)
        .bind(g.leek)
        .bind(g.real)
        .bind(g.same)
        .bind(g.skull)
        .bind(g.eyes)
        .bind(g.yipee)
        .bind(g.ping_good)
        .bind(g.ping_bad)
        .bind(overflow_map_json(&stats.other_given))
        .bind(stats.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
