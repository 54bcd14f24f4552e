use async_trait::async_trait;
use vocab_core::model::{SessionRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, map_session_record_row};
use crate::repository::{SessionRecordRepository, StorageError};

#[async_trait]
impl SessionRecordRepository for SqliteRepository {
    async fn append_record(
        &self,
        user: &UserId,
        record: &SessionRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO session_records (
                id, user_id, recorded_at, selection, mode, score, total_questions, duration_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.id().as_uuid())
        .bind(user.as_str())
        .bind(record.recorded_at())
        .bind(record.selection().key())
        .bind(record.mode().as_str())
        .bind(i64::from(record.score()))
        .bind(i64::from(record.total_questions()))
        .bind(i64_from_u64("duration_secs", record.duration_secs())?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(())
    }

    async fn list_records(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, recorded_at, selection, mode, score, total_questions, duration_secs
            FROM session_records
            WHERE user_id = ?1
            ORDER BY recorded_at DESC
            LIMIT ?2
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| map_session_record_row(row, user))
            .collect()
    }
}
