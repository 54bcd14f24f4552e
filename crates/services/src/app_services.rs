use std::sync::Arc;

use chrono::FixedOffset;
use storage::repository::Storage;
use tracing::{info, warn};
use vocab_core::quiz::FeedbackDelays;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progression::ProgressionService;
use crate::question_bank::QuestionBank;
use crate::sessions::SessionLoopService;
use crate::weak_words::WeakWordTracker;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    vocabulary_size: u64,
    question_bank: Arc<QuestionBank>,
    weak_words: Arc<WeakWordTracker>,
    progression: Arc<ProgressionService>,
    session_loop: Arc<SessionLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the corpus count fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        offset: FixedOffset,
        delays: FeedbackDelays,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, offset, delays).await
    }

    /// Build services over an already opened backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the corpus cannot be counted.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        offset: FixedOffset,
        delays: FeedbackDelays,
    ) -> Result<Self, AppServicesError> {
        let vocabulary_size = storage.vocabulary.count_vocabulary().await?;
        if vocabulary_size == 0 {
            warn!("vocabulary corpus is empty, run the seed tool first");
        } else {
            info!(vocabulary_size, "vocabulary corpus loaded");
        }

        let question_bank = Arc::new(QuestionBank::new(
            Arc::clone(&storage.vocabulary),
            Arc::clone(&storage.weak_words),
        ));
        let weak_words = Arc::new(WeakWordTracker::new(
            clock,
            Arc::clone(&storage.weak_words),
        ));
        let progression = Arc::new(ProgressionService::new(
            clock,
            offset,
            Arc::clone(&storage.user_stats),
        ));
        let session_loop = Arc::new(
            SessionLoopService::new(
                clock,
                QuestionBank::clone(&question_bank),
                WeakWordTracker::clone(&weak_words),
                ProgressionService::clone(&progression),
                Arc::clone(&storage.session_records),
            )
            .with_delays(delays),
        );

        Ok(Self {
            vocabulary_size,
            question_bank,
            weak_words,
            progression,
            session_loop,
        })
    }

    /// Corpus size observed at startup.
    #[must_use]
    pub fn vocabulary_size(&self) -> u64 {
        self.vocabulary_size
    }

    #[must_use]
    pub fn question_bank(&self) -> Arc<QuestionBank> {
        Arc::clone(&self.question_bank)
    }

    #[must_use]
    pub fn weak_words(&self) -> Arc<WeakWordTracker> {
        Arc::clone(&self.weak_words)
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionService> {
        Arc::clone(&self.progression)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }
}
