use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use vocab_core::model::{
    Cleared, Modality, SessionRecord, Tier, UserId, UserStats, VocabId, VocabularyDraft,
    VocabularyItem, WeakTypes, WeakWordEntry, WeakWordError,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape of a weak-word entry.
///
/// Unlike `WeakWordEntry`, the tag set may be empty here: a record written by an
/// older or foreign writer can violate the invariant, and readers must be able to
/// see it in order to repair it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakWordRecord {
    pub item: VocabularyItem,
    pub last_missed: DateTime<Utc>,
    pub weak_types: BTreeSet<Modality>,
}

impl WeakWordRecord {
    #[must_use]
    pub fn from_entry(entry: &WeakWordEntry) -> Self {
        Self {
            item: entry.item().clone(),
            last_missed: entry.last_missed(),
            weak_types: entry.weak_types().iter().collect(),
        }
    }

    /// Convert the record back into a domain entry.
    ///
    /// # Errors
    ///
    /// Returns `WeakWordError::EmptyWeakTypes` if the stored set is empty.
    pub fn into_entry(self) -> Result<WeakWordEntry, WeakWordError> {
        let id = self.item.id();
        let weak_types =
            WeakTypes::from_set(self.weak_types).ok_or(WeakWordError::EmptyWeakTypes(id))?;
        Ok(WeakWordEntry::from_persisted(
            self.item,
            self.last_missed,
            weak_types,
        ))
    }
}

/// What `clear_modality` did to the stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// No entry existed for the item.
    NotPresent,
    /// The modality was removed and others remain.
    Remaining,
    /// The last modality was removed and the entry deleted.
    Deleted,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Read access to the shared vocabulary corpus, plus the writes used by seeding.
#[async_trait]
pub trait VocabularyRepository: Send + Sync {
    /// All items with `tier <= max`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn query_by_tier(&self, max: Tier) -> Result<Vec<VocabularyItem>, StorageError>;

    /// Up to `limit` items regardless of tier, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyItem>, StorageError>;

    /// Insert a new item and let the store assign its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the draft is invalid, or other
    /// storage errors.
    async fn insert_vocabulary(
        &self,
        draft: VocabularyDraft,
    ) -> Result<VocabularyItem, StorageError>;

    /// Persist or replace an item with a known id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_vocabulary(&self, item: &VocabularyItem) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_vocabulary(&self) -> Result<u64, StorageError>;
}

/// Per-user ledger of missed words.
#[async_trait]
pub trait WeakWordRepository: Send + Sync {
    /// Every stored record for the user, most recently missed first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_weak_words(&self, user: &UserId) -> Result<Vec<WeakWordRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_weak_word(
        &self,
        user: &UserId,
        id: VocabId,
    ) -> Result<Option<WeakWordRecord>, StorageError>;

    /// Create the entry with `{modality}` or merge the modality into it, refreshing
    /// `last_missed`. Runs as one read-modify-write unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be read or written.
    async fn upsert_miss(
        &self,
        user: &UserId,
        item: &VocabularyItem,
        modality: Modality,
        at: DateTime<Utc>,
    ) -> Result<WeakWordEntry, StorageError>;

    /// Remove `modality` from the entry, deleting it when the set empties. Runs as
    /// one read-modify-write unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be read or written.
    async fn clear_modality(
        &self,
        user: &UserId,
        id: VocabId,
        modality: Modality,
    ) -> Result<ClearOutcome, StorageError>;

    /// Delete an entry. Deleting a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_weak_word(&self, user: &UserId, id: VocabId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_weak_words(&self, user: &UserId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait UserStatsRepository: Send + Sync {
    /// Stored stats, or `None` for a user that never finished a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or the row is malformed.
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserStats>, StorageError>;

    /// Replace the user's stats as one atomic write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails; nothing is persisted in that case.
    async fn save_stats(&self, user: &UserId, stats: &UserStats) -> Result<(), StorageError>;
}

/// Append-only log of finished sessions.
#[async_trait]
pub trait SessionRecordRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the record id already exists, or other
    /// storage errors.
    async fn append_record(
        &self,
        user: &UserId,
        record: &SessionRecord,
    ) -> Result<(), StorageError>;

    /// Newest records first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_records(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type WeakKey = (UserId, VocabId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    vocabulary: Arc<Mutex<BTreeMap<VocabId, VocabularyItem>>>,
    weak_words: Arc<Mutex<HashMap<WeakKey, WeakWordRecord>>>,
    stats: Arc<Mutex<HashMap<UserId, UserStats>>>,
    records: Arc<Mutex<HashMap<UserId, Vec<SessionRecord>>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a weak-word record as-is, bypassing the merge rules.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_weak_record(&self, user: &UserId, record: WeakWordRecord) -> Result<(), StorageError> {
        let mut guard = self.weak_words.lock().map_err(poisoned)?;
        guard.insert((user.clone(), record.item.id()), record);
        Ok(())
    }
}

#[async_trait]
impl VocabularyRepository for InMemoryRepository {
    async fn query_by_tier(&self, max: Tier) -> Result<Vec<VocabularyItem>, StorageError> {
        let guard = self.vocabulary.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|item| max.admits(item.tier()))
            .cloned()
            .collect())
    }

    async fn list_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyItem>, StorageError> {
        let guard = self.vocabulary.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard.values().take(limit).cloned().collect())
    }

    async fn insert_vocabulary(
        &self,
        draft: VocabularyDraft,
    ) -> Result<VocabularyItem, StorageError> {
        let mut guard = self.vocabulary.lock().map_err(poisoned)?;
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let item = draft
            .validate(VocabId::new(next))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(item.id(), item.clone());
        Ok(item)
    }

    async fn upsert_vocabulary(&self, item: &VocabularyItem) -> Result<(), StorageError> {
        let mut guard = self.vocabulary.lock().map_err(poisoned)?;
        guard.insert(item.id(), item.clone());
        Ok(())
    }

    async fn count_vocabulary(&self) -> Result<u64, StorageError> {
        let guard = self.vocabulary.lock().map_err(poisoned)?;
        Ok(guard.len() as u64)
    }
}

#[async_trait]
impl WeakWordRepository for InMemoryRepository {
    async fn list_weak_words(&self, user: &UserId) -> Result<Vec<WeakWordRecord>, StorageError> {
        let guard = self.weak_words.lock().map_err(poisoned)?;
        let mut out: Vec<WeakWordRecord> = guard
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|(_, record)| record.clone())
            .collect();
        out.sort_by(|a, b| {
            b.last_missed
                .cmp(&a.last_missed)
                .then_with(|| a.item.id().cmp(&b.item.id()))
        });
        Ok(out)
    }

    async fn get_weak_word(
        &self,
        user: &UserId,
        id: VocabId,
    ) -> Result<Option<WeakWordRecord>, StorageError> {
        let guard = self.weak_words.lock().map_err(poisoned)?;
        Ok(guard.get(&(user.clone(), id)).cloned())
    }

    async fn upsert_miss(
        &self,
        user: &UserId,
        item: &VocabularyItem,
        modality: Modality,
        at: DateTime<Utc>,
    ) -> Result<WeakWordEntry, StorageError> {
        let mut guard = self.weak_words.lock().map_err(poisoned)?;
        let key = (user.clone(), item.id());
        let entry = match guard.remove(&key).map(WeakWordRecord::into_entry) {
            Some(Ok(mut existing)) => {
                existing.record_miss(modality, at);
                existing
            }
            // A stored empty set is treated as absent and overwritten.
            Some(Err(_)) | None => WeakWordEntry::first_miss(item.clone(), modality, at),
        };
        guard.insert(key, WeakWordRecord::from_entry(&entry));
        Ok(entry)
    }

    async fn clear_modality(
        &self,
        user: &UserId,
        id: VocabId,
        modality: Modality,
    ) -> Result<ClearOutcome, StorageError> {
        let mut guard = self.weak_words.lock().map_err(poisoned)?;
        let key = (user.clone(), id);
        let Some(record) = guard.remove(&key) else {
            return Ok(ClearOutcome::NotPresent);
        };
        match record.into_entry().map(|entry| entry.clear(modality)) {
            Ok(Cleared::Remaining(entry)) => {
                guard.insert(key, WeakWordRecord::from_entry(&entry));
                Ok(ClearOutcome::Remaining)
            }
            Ok(Cleared::Empty) | Err(_) => Ok(ClearOutcome::Deleted),
        }
    }

    async fn delete_weak_word(&self, user: &UserId, id: VocabId) -> Result<(), StorageError> {
        let mut guard = self.weak_words.lock().map_err(poisoned)?;
        guard.remove(&(user.clone(), id));
        Ok(())
    }

    async fn count_weak_words(&self, user: &UserId) -> Result<u64, StorageError> {
        let guard = self.weak_words.lock().map_err(poisoned)?;
        Ok(guard.keys().filter(|(owner, _)| owner == user).count() as u64)
    }
}

#[async_trait]
impl UserStatsRepository for InMemoryRepository {
    async fn get_stats(&self, user: &UserId) -> Result<Option<UserStats>, StorageError> {
        let guard = self.stats.lock().map_err(poisoned)?;
        Ok(guard.get(user).cloned())
    }

    async fn save_stats(&self, user: &UserId, stats: &UserStats) -> Result<(), StorageError> {
        let mut guard = self.stats.lock().map_err(poisoned)?;
        guard.insert(user.clone(), stats.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionRecordRepository for InMemoryRepository {
    async fn append_record(
        &self,
        user: &UserId,
        record: &SessionRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        let log = guard.entry(user.clone()).or_default();
        if log.iter().any(|r| r.id() == record.id()) {
            return Err(StorageError::Conflict);
        }
        log.push(record.clone());
        Ok(())
    }

    async fn list_records(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut out: Vec<SessionRecord> = guard.get(user).cloned().unwrap_or_default();
        out.sort_by(|a, b| b.recorded_at().cmp(&a.recorded_at()));
        out.truncate(limit);
        Ok(out)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub vocabulary: Arc<dyn VocabularyRepository>,
    pub weak_words: Arc<dyn WeakWordRepository>,
    pub user_stats: Arc<dyn UserStatsRepository>,
    pub session_records: Arc<dyn SessionRecordRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for direct access.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let vocabulary: Arc<dyn VocabularyRepository> = Arc::new(repo.clone());
        let weak_words: Arc<dyn WeakWordRepository> = Arc::new(repo.clone());
        let user_stats: Arc<dyn UserStatsRepository> = Arc::new(repo.clone());
        let session_records: Arc<dyn SessionRecordRepository> = Arc::new(repo);
        Self {
            vocabulary,
            weak_words,
            user_stats,
            session_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_core::model::{QuizMode, Selection};
    use vocab_core::time::fixed_now;

    fn user() -> UserId {
        UserId::new("tester").unwrap()
    }

    fn draft(word: &str, tier: u32) -> VocabularyDraft {
        VocabularyDraft::new(word, format!("{word}-meaning")).with_tier(Tier::new(tier))
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_filters_by_tier() {
        let repo = InMemoryRepository::new();
        let a = repo.insert_vocabulary(draft("a", 1)).await.unwrap();
        let b = repo.insert_vocabulary(draft("b", 5)).await.unwrap();
        assert_eq!(a.id(), VocabId::new(1));
        assert_eq!(b.id(), VocabId::new(2));

        let easy = repo.query_by_tier(Tier::new(4)).await.unwrap();
        assert_eq!(easy, vec![a]);
        assert_eq!(repo.count_vocabulary().await.unwrap(), 2);
        assert_eq!(repo.list_vocabulary(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_rejects_blank_word() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_vocabulary(VocabularyDraft::new("  ", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn miss_then_clear_deletes_entry() {
        let repo = InMemoryRepository::new();
        let item = repo.insert_vocabulary(draft("cat", 1)).await.unwrap();

        repo.upsert_miss(&user(), &item, Modality::Meaning, fixed_now())
            .await
            .unwrap();
        let merged = repo
            .upsert_miss(&user(), &item, Modality::Spelling, fixed_now())
            .await
            .unwrap();
        assert_eq!(merged.weak_types().len(), 2);

        let first = repo
            .clear_modality(&user(), item.id(), Modality::Meaning)
            .await
            .unwrap();
        assert_eq!(first, ClearOutcome::Remaining);
        let second = repo
            .clear_modality(&user(), item.id(), Modality::Spelling)
            .await
            .unwrap();
        assert_eq!(second, ClearOutcome::Deleted);
        assert!(repo.get_weak_word(&user(), item.id()).await.unwrap().is_none());

        let absent = repo
            .clear_modality(&user(), item.id(), Modality::Spelling)
            .await
            .unwrap();
        assert_eq!(absent, ClearOutcome::NotPresent);
    }

    #[tokio::test]
    async fn empty_record_converts_to_error() {
        let repo = InMemoryRepository::new();
        let item = repo.insert_vocabulary(draft("dog", 1)).await.unwrap();
        repo.put_weak_record(
            &user(),
            WeakWordRecord {
                item: item.clone(),
                last_missed: fixed_now(),
                weak_types: BTreeSet::new(),
            },
        )
        .unwrap();

        let stored = repo.get_weak_word(&user(), item.id()).await.unwrap().unwrap();
        assert_eq!(
            stored.into_entry(),
            Err(WeakWordError::EmptyWeakTypes(item.id()))
        );
        assert_eq!(repo.count_weak_words(&user()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn session_records_are_append_only_and_newest_first() {
        let repo = InMemoryRepository::new();
        let older = SessionRecord::new(
            fixed_now(),
            Selection::MaxTier(Tier::new(4)),
            QuizMode::Choice,
            3,
            5,
            40,
        )
        .unwrap();
        let newer = SessionRecord::new(
            fixed_now() + chrono::Duration::minutes(5),
            Selection::WeakWords(user()),
            QuizMode::Spelling,
            1,
            2,
            20,
        )
        .unwrap();
        repo.append_record(&user(), &older).await.unwrap();
        repo.append_record(&user(), &newer).await.unwrap();
        assert!(matches!(
            repo.append_record(&user(), &older).await,
            Err(StorageError::Conflict)
        ));

        let listed = repo.list_records(&user(), 10).await.unwrap();
        assert_eq!(listed, vec![newer, older]);
    }
}
