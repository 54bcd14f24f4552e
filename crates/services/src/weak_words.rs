use std::collections::HashSet;
use std::sync::Arc;

use storage::repository::{ClearOutcome, StorageError, WeakWordRepository};
use tracing::warn;
use vocab_core::model::{Modality, UserId, VocabId, VocabularyItem, WeakWordEntry};

use crate::Clock;

/// Tally of one `record_outcome` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeakWordReport {
    /// Misses filed (new entries and merges).
    pub added: u32,
    /// Entries that lost the modality and kept others.
    pub cleared: u32,
    /// Entries that lost their last modality and were removed.
    pub deleted: u32,
    /// Items whose write failed and was skipped.
    pub failed: u32,
}

/// Maintains the per-user ledger of missed words.
#[derive(Clone)]
pub struct WeakWordTracker {
    clock: Clock,
    weak_words: Arc<dyn WeakWordRepository>,
}

impl WeakWordTracker {
    #[must_use]
    pub fn new(clock: Clock, weak_words: Arc<dyn WeakWordRepository>) -> Self {
        Self { clock, weak_words }
    }

    /// Fold a finished session into the ledger.
    ///
    /// Missed items gain `modality`; attempted items that were not missed lose it.
    /// Each item is written independently, and a failed write is logged and
    /// counted rather than aborting the rest.
    pub async fn record_outcome(
        &self,
        user: &UserId,
        modality: Modality,
        missed: &[VocabularyItem],
        attempted: &[VocabularyItem],
    ) -> WeakWordReport {
        let now = self.clock.now();
        let mut report = WeakWordReport::default();
        let missed_ids: HashSet<VocabId> = missed.iter().map(VocabularyItem::id).collect();

        for item in missed {
            match self.weak_words.upsert_miss(user, item, modality, now).await {
                Ok(_) => report.added += 1,
                Err(e) => {
                    warn!(user = %user, vocab_id = %item.id(), error = %e, "failed to file weak word");
                    report.failed += 1;
                }
            }
        }

        let mut cleared_ids = HashSet::new();
        for item in attempted {
            if missed_ids.contains(&item.id()) || !cleared_ids.insert(item.id()) {
                continue;
            }
            match self.weak_words.clear_modality(user, item.id(), modality).await {
                Ok(ClearOutcome::Remaining) => report.cleared += 1,
                Ok(ClearOutcome::Deleted) => report.deleted += 1,
                Ok(ClearOutcome::NotPresent) => {}
                Err(e) => {
                    warn!(user = %user, vocab_id = %item.id(), error = %e, "failed to clear weak word");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Entries tagged with `modality`, most recently missed first.
    ///
    /// Records found with an empty tag set are deleted and skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the ledger cannot be read.
    pub async fn list(
        &self,
        user: &UserId,
        modality: Modality,
    ) -> Result<Vec<WeakWordEntry>, StorageError> {
        let records = self.weak_words.list_weak_words(user).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let id = record.item.id();
            match record.into_entry() {
                Ok(entry) if entry.is_weak_in(modality) => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    warn!(user = %user, vocab_id = %id, error = %e, "removing weak word with no weak types");
                    if let Err(e) = self.weak_words.delete_weak_word(user, id).await {
                        warn!(user = %user, vocab_id = %id, error = %e, "failed to remove empty weak word");
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Number of entries in the user's ledger, for badges.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the ledger cannot be read.
    pub async fn count(&self, user: &UserId) -> Result<u64, StorageError> {
        self.weak_words.count_weak_words(user).await
    }
}
