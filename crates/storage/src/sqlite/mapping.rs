use std::collections::BTreeSet;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use vocab_core::model::{
    DailyMission, Modality, QuizMode, SessionRecord, SessionRecordId, Selection, Tier, UserId,
    UserStats, VocabId, VocabularyItem,
};

use crate::repository::{StorageError, WeakWordRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn vocab_id_to_i64(id: VocabId) -> Result<i64, StorageError> {
    i64_from_u64("vocab_id", id.value())
}

pub(crate) fn vocab_id_from_i64(v: i64) -> Result<VocabId, StorageError> {
    Ok(VocabId::new(u64_from_i64("vocab_id", v)?))
}

//
// ─── VOCABULARY ────────────────────────────────────────────────────────────────
//

/// Maps the shared vocabulary columns (`id, word, meaning, category, tier`), which
/// weak-word rows carry as a denormalized copy.
pub(crate) fn map_vocabulary_row(row: &SqliteRow) -> Result<VocabularyItem, StorageError> {
    let id = vocab_id_from_i64(row.try_get::<i64, _>("vocab_id").map_err(ser)?)?;
    let tier = u32_from_i64("tier", row.try_get::<i64, _>("tier").map_err(ser)?)?;

    VocabularyItem::from_persisted(
        id,
        row.try_get("word").map_err(ser)?,
        row.try_get("meaning").map_err(ser)?,
        row.try_get("category").map_err(ser)?,
        Tier::new(tier),
    )
    .map_err(ser)
}

//
// ─── WEAK WORDS ────────────────────────────────────────────────────────────────
//

/// Weak types are stored as a JSON array of modality names.
pub(crate) fn encode_weak_types(types: &BTreeSet<Modality>) -> Result<String, StorageError> {
    serde_json::to_string(types).map_err(ser)
}

pub(crate) fn decode_weak_types(raw: &str) -> Result<BTreeSet<Modality>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_weak_word_row(row: &SqliteRow) -> Result<WeakWordRecord, StorageError> {
    let raw: String = row.try_get("weak_types").map_err(ser)?;
    Ok(WeakWordRecord {
        item: map_vocabulary_row(row)?,
        last_missed: row.try_get("last_missed").map_err(ser)?,
        weak_types: decode_weak_types(&raw)?,
    })
}

//
// ─── USER STATS ────────────────────────────────────────────────────────────────
//

/// Maps a `user_stats` row; the study calendar lives in its own table and is
/// filled in by the caller.
pub(crate) fn map_user_stats_row(row: &SqliteRow) -> Result<UserStats, StorageError> {
    let mission_id: Option<String> = row.try_get("mission_id").map_err(ser)?;
    let mission_progress: i64 = row.try_get("mission_progress").map_err(ser)?;
    let daily_mission = mission_id
        .map(|id| {
            DailyMission::from_persisted(&id, u32_from_i64("mission_progress", mission_progress)?)
                .map_err(ser)
        })
        .transpose()?;

    Ok(UserStats {
        exp: u32_from_i64("exp", row.try_get::<i64, _>("exp").map_err(ser)?)?,
        streak_count: u32_from_i64(
            "streak_count",
            row.try_get::<i64, _>("streak_count").map_err(ser)?,
        )?,
        last_study_date: row.try_get("last_study_date").map_err(ser)?,
        study_calendar: BTreeSet::new(),
        daily_mission,
        last_mission_date: row.try_get("last_mission_date").map_err(ser)?,
        total_correct: u32_from_i64(
            "total_correct",
            row.try_get::<i64, _>("total_correct").map_err(ser)?,
        )?,
        total_study_seconds: u64_from_i64(
            "total_study_seconds",
            row.try_get::<i64, _>("total_study_seconds").map_err(ser)?,
        )?,
    })
}

//
// ─── SESSION RECORDS ───────────────────────────────────────────────────────────
//

pub(crate) fn map_session_record_row(
    row: &SqliteRow,
    user: &UserId,
) -> Result<SessionRecord, StorageError> {
    let selection: String = row.try_get("selection").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;

    SessionRecord::from_persisted(
        SessionRecordId::from_uuid(row.try_get("id").map_err(ser)?),
        row.try_get("recorded_at").map_err(ser)?,
        Selection::from_key(&selection, user).map_err(ser)?,
        mode.parse::<QuizMode>().map_err(ser)?,
        u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u64_from_i64(
            "duration_secs",
            row.try_get::<i64, _>("duration_secs").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}
