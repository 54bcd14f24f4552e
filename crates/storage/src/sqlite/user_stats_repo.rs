use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use vocab_core::model::{UserId, UserStats};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, map_user_stats_row};
use crate::repository::{StorageError, UserStatsRepository};

#[async_trait]
impl UserStatsRepository for SqliteRepository {
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserStats>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                exp, streak_count, last_study_date, mission_id, mission_progress,
                last_mission_date, total_correct, total_study_seconds
            FROM user_stats
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut stats = map_user_stats_row(&row)?;

        let days: Vec<NaiveDate> =
            sqlx::query_scalar("SELECT day FROM study_days WHERE user_id = ?1 ORDER BY day ASC")
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(conn)?;
        stats.study_calendar = days.into_iter().collect();

        Ok(Some(stats))
    }

    async fn save_stats(&self, user: &UserId, stats: &UserStats) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let mission = stats.daily_mission.as_ref();
        sqlx::query(
            r"
            INSERT INTO user_stats (
                user_id, exp, level, streak_count, last_study_date, mission_id,
                mission_progress, last_mission_date, total_correct, total_study_seconds,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(user_id) DO UPDATE SET
                exp = excluded.exp,
                level = excluded.level,
                streak_count = excluded.streak_count,
                last_study_date = excluded.last_study_date,
                mission_id = excluded.mission_id,
                mission_progress = excluded.mission_progress,
                last_mission_date = excluded.last_mission_date,
                total_correct = excluded.total_correct,
                total_study_seconds = excluded.total_study_seconds,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(stats.exp))
        .bind(i64::from(stats.level()))
        .bind(i64::from(stats.streak_count))
        .bind(stats.last_study_date)
        .bind(mission.map(|m| m.id().to_owned()))
        .bind(i64::from(mission.map_or(0, |m| m.progress())))
        .bind(stats.last_mission_date)
        .bind(i64::from(stats.total_correct))
        .bind(i64_from_u64("total_study_seconds", stats.total_study_seconds)?)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // The calendar is append-only: days are never removed.
        for day in &stats.study_calendar {
            sqlx::query(
                r"
                INSERT INTO study_days (user_id, day)
                VALUES (?1, ?2)
                ON CONFLICT(user_id, day) DO NOTHING
                ",
            )
            .bind(user.as_str())
            .bind(*day)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
