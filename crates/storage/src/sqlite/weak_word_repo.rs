use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use vocab_core::model::{Modality, UserId, VocabId, VocabularyItem, WeakWordEntry};

use super::SqliteRepository;
use super::mapping::{conn, encode_weak_types, map_weak_word_row, u64_from_i64, vocab_id_to_i64};
use crate::repository::{ClearOutcome, StorageError, WeakWordRecord, WeakWordRepository};

const SELECT_WEAK_WORD: &str = r"
    SELECT vocab_id, word, meaning, category, tier, last_missed, weak_types
    FROM weak_words
";

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    id: VocabId,
) -> Result<Option<WeakWordRecord>, StorageError> {
    let sql = format!("{SELECT_WEAK_WORD} WHERE user_id = ?1 AND vocab_id = ?2");
    let row = sqlx::query(&sql)
        .bind(user.as_str())
        .bind(vocab_id_to_i64(id)?)
        .fetch_optional(&mut **tx)
        .await
        .map_err(conn)?;
    row.as_ref().map(map_weak_word_row).transpose()
}

async fn write_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    record: &WeakWordRecord,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO weak_words (
            user_id, vocab_id, word, meaning, category, tier, last_missed, weak_types
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(user_id, vocab_id) DO UPDATE SET
            word = excluded.word,
            meaning = excluded.meaning,
            category = excluded.category,
            tier = excluded.tier,
            last_missed = excluded.last_missed,
            weak_types = excluded.weak_types
        ",
    )
    .bind(user.as_str())
    .bind(vocab_id_to_i64(record.item.id())?)
    .bind(record.item.word())
    .bind(record.item.meaning())
    .bind(record.item.category())
    .bind(i64::from(record.item.tier().value()))
    .bind(record.last_missed)
    .bind(encode_weak_types(&record.weak_types)?)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

async fn delete_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    id: VocabId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM weak_words WHERE user_id = ?1 AND vocab_id = ?2")
        .bind(user.as_str())
        .bind(vocab_id_to_i64(id)?)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    Ok(())
}

#[async_trait]
impl WeakWordRepository for SqliteRepository {
    async fn list_weak_words(&self, user: &UserId) -> Result<Vec<WeakWordRecord>, StorageError> {
        let sql =
            format!("{SELECT_WEAK_WORD} WHERE user_id = ?1 ORDER BY last_missed DESC, vocab_id ASC");
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_weak_word_row).collect()
    }

    async fn get_weak_word(
        &self,
        user: &UserId,
        id: VocabId,
    ) -> Result<Option<WeakWordRecord>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let record = fetch_in_tx(&mut tx, user, id).await?;
        tx.commit().await.map_err(conn)?;
        Ok(record)
    }

    async fn upsert_miss(
        &self,
        user: &UserId,
        item: &VocabularyItem,
        modality: Modality,
        at: DateTime<Utc>,
    ) -> Result<WeakWordEntry, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let entry = match fetch_in_tx(&mut tx, user, item.id())
            .await?
            .map(WeakWordRecord::into_entry)
        {
            Some(Ok(mut existing)) => {
                existing.record_miss(modality, at);
                existing
            }
            // A stored empty set is treated as absent and overwritten.
            Some(Err(_)) | None => WeakWordEntry::first_miss(item.clone(), modality, at),
        };
        write_in_tx(&mut tx, user, &WeakWordRecord::from_entry(&entry)).await?;

        tx.commit().await.map_err(conn)?;
        Ok(entry)
    }

    async fn clear_modality(
        &self,
        user: &UserId,
        id: VocabId,
        modality: Modality,
    ) -> Result<ClearOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let Some(mut record) = fetch_in_tx(&mut tx, user, id).await? else {
            tx.commit().await.map_err(conn)?;
            return Ok(ClearOutcome::NotPresent);
        };

        record.weak_types.remove(&modality);
        let outcome = if record.weak_types.is_empty() {
            delete_in_tx(&mut tx, user, id).await?;
            ClearOutcome::Deleted
        } else {
            write_in_tx(&mut tx, user, &record).await?;
            ClearOutcome::Remaining
        };

        tx.commit().await.map_err(conn)?;
        Ok(outcome)
    }

    async fn delete_weak_word(&self, user: &UserId, id: VocabId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        delete_in_tx(&mut tx, user, id).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn count_weak_words(&self, user: &UserId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weak_words WHERE user_id = ?1")
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64_from_i64("count", count)
    }
}

impl SqliteRepository {
    /// Write a raw weak-word row without merge rules, e.g. to import a ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    pub async fn put_weak_record(
        &self,
        user: &UserId,
        record: &WeakWordRecord,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        write_in_tx(&mut tx, user, record).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
