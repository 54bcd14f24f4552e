use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::VocabId;

//
// ─── TIER ──────────────────────────────────────────────────────────────────────
//

/// Difficulty band of a vocabulary item. Lower tiers admit easier content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tier(u32);

impl Tier {
    /// Sentinel for items that were imported without a classification.
    pub const UNCLASSIFIED: Tier = Tier(99);

    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn admits(&self, other: Tier) -> bool {
        other <= *self
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier({})", self.0)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VocabularyError {
    #[error("word cannot be empty")]
    EmptyWord,

    #[error("meaning cannot be empty")]
    EmptyMeaning,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated vocabulary input, e.g. from a seed file or an import row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyDraft {
    pub word: String,
    pub meaning: String,
    pub category: String,
    pub tier: Option<Tier>,
}

impl VocabularyDraft {
    #[must_use]
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            category: String::new(),
            tier: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Validate and attach the store-assigned identifier.
    ///
    /// Word, meaning and category are trimmed; a missing tier becomes
    /// `Tier::UNCLASSIFIED`.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError` if the word or the meaning is blank.
    pub fn validate(self, id: VocabId) -> Result<VocabularyItem, VocabularyError> {
        let word = self.word.trim();
        if word.is_empty() {
            return Err(VocabularyError::EmptyWord);
        }
        let meaning = self.meaning.trim();
        if meaning.is_empty() {
            return Err(VocabularyError::EmptyMeaning);
        }

        Ok(VocabularyItem {
            id,
            word: word.to_owned(),
            meaning: meaning.to_owned(),
            category: self.category.trim().to_owned(),
            tier: self.tier.unwrap_or(Tier::UNCLASSIFIED),
        })
    }
}

//
// ─── ITEM ──────────────────────────────────────────────────────────────────────
//

/// A word/meaning pair from the shared corpus. Immutable once imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    id: VocabId,
    word: String,
    meaning: String,
    category: String,
    tier: Tier,
}

impl VocabularyItem {
    /// Rehydrate an item from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError` if the stored word or meaning is blank.
    pub fn from_persisted(
        id: VocabId,
        word: String,
        meaning: String,
        category: String,
        tier: Tier,
    ) -> Result<Self, VocabularyError> {
        VocabularyDraft {
            word,
            meaning,
            category,
            tier: Some(tier),
        }
        .validate(id)
    }

    #[must_use]
    pub fn id(&self) -> VocabId {
        self.id
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
