use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates the vocabulary corpus, the weak-word ledger, user stats with
/// the study calendar, and the session log.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS vocabulary (
                    id INTEGER PRIMARY KEY,
                    word TEXT NOT NULL CHECK (length(trim(word)) > 0),
                    meaning TEXT NOT NULL CHECK (length(trim(meaning)) > 0),
                    category TEXT NOT NULL DEFAULT '',
                    tier INTEGER NOT NULL CHECK (tier >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS weak_words (
                    user_id TEXT NOT NULL,
                    vocab_id INTEGER NOT NULL,
                    word TEXT NOT NULL,
                    meaning TEXT NOT NULL,
                    category TEXT NOT NULL,
                    tier INTEGER NOT NULL,
                    last_missed TEXT NOT NULL,
                    weak_types TEXT NOT NULL,
                    PRIMARY KEY (user_id, vocab_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_stats (
                    user_id TEXT PRIMARY KEY,
                    exp INTEGER NOT NULL CHECK (exp >= 0),
                    level INTEGER NOT NULL CHECK (level >= 1),
                    streak_count INTEGER NOT NULL CHECK (streak_count >= 0),
                    last_study_date TEXT,
                    mission_id TEXT,
                    mission_progress INTEGER NOT NULL DEFAULT 0 CHECK (mission_progress >= 0),
                    last_mission_date TEXT,
                    total_correct INTEGER NOT NULL DEFAULT 0 CHECK (total_correct >= 0),
                    total_study_seconds INTEGER NOT NULL DEFAULT 0 CHECK (total_study_seconds >= 0),
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS study_days (
                    user_id TEXT NOT NULL,
                    day TEXT NOT NULL,
                    PRIMARY KEY (user_id, day),
                    FOREIGN KEY (user_id) REFERENCES user_stats(user_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_records (
                    id BLOB PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    selection TEXT NOT NULL,
                    mode TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= score),
                    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_vocabulary_tier
                    ON vocabulary(tier, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_weak_words_user_last_missed
                    ON weak_words(user_id, last_missed);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_records_user_recorded_at
                    ON session_records(user_id, recorded_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
