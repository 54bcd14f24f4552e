use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use storage::repository::{VocabularyRepository, WeakWordRepository};
use tracing::{debug, warn};
use vocab_core::model::{Modality, Question, Selection, VocabularyItem, build_questions};

use crate::error::QuestionBankError;

/// Size of the general pool distractors are drawn from in weak-word sessions.
pub const DISTRACTOR_POOL_LIMIT: u32 = 200;

/// Items eligible for a session plus the pool their distractors come from.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    selected: Vec<VocabularyItem>,
    pool: Vec<VocabularyItem>,
}

impl Candidates {
    #[must_use]
    pub fn new(selected: Vec<VocabularyItem>, pool: Vec<VocabularyItem>) -> Self {
        Self { selected, pool }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Shuffle, keep at most `count` unique items, and build their questions.
    pub fn into_questions<R: Rng + ?Sized>(self, count: usize, rng: &mut R) -> Vec<Question> {
        let Self { mut selected, pool } = self;
        let mut seen = HashSet::new();
        selected.retain(|item| seen.insert(item.id()));
        selected.shuffle(rng);
        selected.truncate(count);
        build_questions(selected, &pool, rng)
    }
}

/// Reads the corpus and the weak-word ledger and turns them into question sets.
#[derive(Clone)]
pub struct QuestionBank {
    vocabulary: Arc<dyn VocabularyRepository>,
    weak_words: Arc<dyn WeakWordRepository>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(
        vocabulary: Arc<dyn VocabularyRepository>,
        weak_words: Arc<dyn WeakWordRepository>,
    ) -> Self {
        Self {
            vocabulary,
            weak_words,
        }
    }

    /// Fetch the items a session may draw from.
    ///
    /// For a weak-word selection only entries tagged with `modality` qualify; an
    /// empty ledger yields empty candidates rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::EmptyCorpus` when no item is at or below the
    /// requested tier, or `QuestionBankError::Storage` when a required read fails.
    pub async fn load(
        &self,
        selection: &Selection,
        modality: Modality,
    ) -> Result<Candidates, QuestionBankError> {
        match selection {
            Selection::MaxTier(max_tier) => {
                let items = self.vocabulary.query_by_tier(*max_tier).await?;
                if items.is_empty() {
                    return Err(QuestionBankError::EmptyCorpus {
                        max_tier: *max_tier,
                    });
                }
                debug!(tier = %max_tier, eligible = items.len(), "loaded tier candidates");
                Ok(Candidates::new(items.clone(), items))
            }
            Selection::WeakWords(user) => {
                let weak: Vec<VocabularyItem> = self
                    .weak_words
                    .list_weak_words(user)
                    .await?
                    .into_iter()
                    .filter(|record| record.weak_types.contains(&modality))
                    .map(|record| record.item)
                    .collect();
                if weak.is_empty() {
                    return Ok(Candidates::default());
                }

                let pool = match self.vocabulary.list_vocabulary(DISTRACTOR_POOL_LIMIT).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        warn!(
                            user = %user,
                            error = %e,
                            "distractor pool unavailable, drawing from weak words only"
                        );
                        weak.clone()
                    }
                };
                debug!(user = %user, %modality, eligible = weak.len(), "loaded weak candidates");
                Ok(Candidates::new(weak, pool))
            }
        }
    }

    /// Load candidates and build up to `count` questions.
    ///
    /// # Errors
    ///
    /// See [`QuestionBank::load`].
    pub async fn select_questions<R: Rng + ?Sized>(
        &self,
        selection: &Selection,
        modality: Modality,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Question>, QuestionBankError> {
        let candidates = self.load(selection, modality).await?;
        Ok(candidates.into_questions(count, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use storage::repository::InMemoryRepository;
    use vocab_core::model::{Tier, UserId, VocabularyDraft};
    use vocab_core::time::fixed_now;

    async fn seeded(n: u32) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for i in 1..=n {
            repo.insert_vocabulary(
                VocabularyDraft::new(format!("word{i}"), format!("meaning{i}"))
                    .with_tier(Tier::new(i % 8 + 1)),
            )
            .await
            .unwrap();
        }
        repo
    }

    fn bank(repo: &InMemoryRepository) -> QuestionBank {
        QuestionBank::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn tier_selection_respects_max_tier_and_count() {
        let repo = seeded(40).await;
        let mut rng = StdRng::seed_from_u64(1);
        let questions = bank(&repo)
            .select_questions(&Selection::MaxTier(Tier::new(4)), Modality::Meaning, 10, &mut rng)
            .await
            .unwrap();

        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| q.item().tier() <= Tier::new(4)));
        let ids: HashSet<_> = questions.iter().map(Question::id).collect();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn fewer_eligible_items_than_requested_uses_all() {
        let repo = seeded(16).await;
        let mut rng = StdRng::seed_from_u64(2);
        let questions = bank(&repo)
            .select_questions(&Selection::MaxTier(Tier::new(1)), Modality::Meaning, 10, &mut rng)
            .await
            .unwrap();
        // Tier 1 holds i % 8 == 0, i.e. items 8 and 16.
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn empty_tier_is_an_error() {
        let repo = InMemoryRepository::new();
        let mut rng = StdRng::seed_from_u64(3);
        let err = bank(&repo)
            .select_questions(&Selection::MaxTier(Tier::new(4)), Modality::Meaning, 10, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, QuestionBankError::EmptyCorpus { .. }));
    }

    #[tokio::test]
    async fn weak_selection_filters_by_modality() {
        let repo = seeded(10).await;
        let user = UserId::new("u").unwrap();
        let items = repo.list_vocabulary(10).await.unwrap();
        repo.upsert_miss(&user, &items[0], Modality::Meaning, fixed_now())
            .await
            .unwrap();
        repo.upsert_miss(&user, &items[1], Modality::Spelling, fixed_now())
            .await
            .unwrap();

        let mut rng = StdRng::seed_from_u64(4);
        let selection = Selection::WeakWords(user.clone());
        let meaning = bank(&repo)
            .select_questions(&selection, Modality::Meaning, 10, &mut rng)
            .await
            .unwrap();
        assert_eq!(meaning.len(), 1);
        assert_eq!(meaning[0].id(), items[0].id());
        // Distractors come from the general pool.
        assert!(meaning[0].choices().iter().all(|c| !c.is_placeholder()));

        let other = Selection::WeakWords(UserId::new("nobody").unwrap());
        let none = bank(&repo)
            .select_questions(&other, Modality::Meaning, 10, &mut rng)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
