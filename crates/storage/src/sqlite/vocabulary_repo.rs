use async_trait::async_trait;
use vocab_core::model::{Tier, VocabId, VocabularyDraft, VocabularyItem};

use super::SqliteRepository;
use super::mapping::{conn, map_vocabulary_row, ser, u64_from_i64, vocab_id_to_i64};
use crate::repository::{StorageError, VocabularyRepository};

#[async_trait]
impl VocabularyRepository for SqliteRepository {
    async fn query_by_tier(&self, max: Tier) -> Result<Vec<VocabularyItem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id AS vocab_id, word, meaning, category, tier
            FROM vocabulary
            WHERE tier <= ?1
            ORDER BY id ASC
            ",
        )
        .bind(i64::from(max.value()))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_vocabulary_row).collect()
    }

    async fn list_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyItem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id AS vocab_id, word, meaning, category, tier
            FROM vocabulary
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_vocabulary_row).collect()
    }

    async fn insert_vocabulary(
        &self,
        draft: VocabularyDraft,
    ) -> Result<VocabularyItem, StorageError> {
        // Validate against a placeholder id first so nothing invalid is written.
        let checked = draft.validate(VocabId::new(0)).map_err(ser)?;

        let res = sqlx::query(
            r"
            INSERT INTO vocabulary (word, meaning, category, tier)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(checked.word())
        .bind(checked.meaning())
        .bind(checked.category())
        .bind(i64::from(checked.tier().value()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = VocabId::new(u64_from_i64("vocab_id", res.last_insert_rowid())?);
        VocabularyItem::from_persisted(
            id,
            checked.word().to_owned(),
            checked.meaning().to_owned(),
            checked.category().to_owned(),
            checked.tier(),
        )
        .map_err(ser)
    }

    async fn upsert_vocabulary(&self, item: &VocabularyItem) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO vocabulary (id, word, meaning, category, tier)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                word = excluded.word,
                meaning = excluded.meaning,
                category = excluded.category,
                tier = excluded.tier
            ",
        )
        .bind(vocab_id_to_i64(item.id())?)
        .bind(item.word())
        .bind(item.meaning())
        .bind(item.category())
        .bind(i64::from(item.tier().value()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn count_vocabulary(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vocabulary")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64_from_i64("count", count)
    }
}
