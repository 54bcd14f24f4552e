use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{Modality, Tier, VocabId, VocabularyItem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WeakWordError {
    /// A weak word must carry at least one modality; an empty one should not exist.
    #[error("weak word {0} has no weak types")]
    EmptyWeakTypes(VocabId),
}

//
// ─── WEAK TYPES ────────────────────────────────────────────────────────────────
//

/// Non-empty set of modalities a word was missed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<Modality>", into = "BTreeSet<Modality>")]
pub struct WeakTypes(BTreeSet<Modality>);

impl WeakTypes {
    #[must_use]
    pub fn single(modality: Modality) -> Self {
        Self(BTreeSet::from([modality]))
    }

    /// Returns `None` for an empty set.
    #[must_use]
    pub fn from_set(set: BTreeSet<Modality>) -> Option<Self> {
        if set.is_empty() { None } else { Some(Self(set)) }
    }

    #[must_use]
    pub fn contains(&self, modality: Modality) -> bool {
        self.0.contains(&modality)
    }

    pub fn iter(&self) -> impl Iterator<Item = Modality> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, modality: Modality) {
        self.0.insert(modality);
    }

    /// Remove a modality, consuming the set; `None` when nothing is left.
    fn without(mut self, modality: Modality) -> Option<Self> {
        self.0.remove(&modality);
        Self::from_set(self.0)
    }
}

impl TryFrom<BTreeSet<Modality>> for WeakTypes {
    type Error = &'static str;

    fn try_from(set: BTreeSet<Modality>) -> Result<Self, Self::Error> {
        Self::from_set(set).ok_or("weak types cannot be empty")
    }
}

impl From<WeakTypes> for BTreeSet<Modality> {
    fn from(types: WeakTypes) -> Self {
        types.0
    }
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// Result of clearing one modality from an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleared {
    /// Other modalities remain; the entry stays.
    Remaining(WeakWordEntry),
    /// That was the last modality; the entry must be deleted.
    Empty,
}

/// A word the user has missed, with a denormalized copy of the vocabulary fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakWordEntry {
    item: VocabularyItem,
    last_missed: DateTime<Utc>,
    weak_types: WeakTypes,
}

impl WeakWordEntry {
    /// First miss of an item.
    #[must_use]
    pub fn first_miss(item: VocabularyItem, modality: Modality, at: DateTime<Utc>) -> Self {
        Self {
            item,
            last_missed: at,
            weak_types: WeakTypes::single(modality),
        }
    }

    #[must_use]
    pub fn from_persisted(
        item: VocabularyItem,
        last_missed: DateTime<Utc>,
        weak_types: WeakTypes,
    ) -> Self {
        Self {
            item,
            last_missed,
            weak_types,
        }
    }

    /// Record another miss: add the modality and refresh `last_missed`.
    ///
    /// Applying the same miss twice leaves the tag set unchanged.
    pub fn record_miss(&mut self, modality: Modality, at: DateTime<Utc>) {
        self.weak_types.insert(modality);
        if at > self.last_missed {
            self.last_missed = at;
        }
    }

    /// Drop a modality after a correct answer.
    #[must_use]
    pub fn clear(self, modality: Modality) -> Cleared {
        let Self {
            item,
            last_missed,
            weak_types,
        } = self;
        match weak_types.without(modality) {
            Some(weak_types) => Cleared::Remaining(Self {
                item,
                last_missed,
                weak_types,
            }),
            None => Cleared::Empty,
        }
    }

    #[must_use]
    pub fn item(&self) -> &VocabularyItem {
        &self.item
    }

    #[must_use]
    pub fn id(&self) -> VocabId {
        self.item.id()
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        self.item.tier()
    }

    #[must_use]
    pub fn last_missed(&self) -> DateTime<Utc> {
        self.last_missed
    }

    #[must_use]
    pub fn weak_types(&self) -> &WeakTypes {
        &self.weak_types
    }

    #[must_use]
    pub fn is_weak_in(&self, modality: Modality) -> bool {
        self.weak_types.contains(modality)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VocabularyDraft;
    use crate::time::fixed_now;

    fn item() -> VocabularyItem {
        VocabularyDraft::new("apple", "りんご")
            .validate(VocabId::new(7))
            .unwrap()
    }

    #[test]
    fn repeated_miss_is_idempotent() {
        let mut entry = WeakWordEntry::first_miss(item(), Modality::Meaning, fixed_now());
        entry.record_miss(Modality::Meaning, fixed_now());
        entry.record_miss(Modality::Meaning, fixed_now());
        assert_eq!(entry.weak_types().len(), 1);
        assert_eq!(entry.last_missed(), fixed_now());
    }

    #[test]
    fn miss_under_new_modality_merges() {
        let later = fixed_now() + chrono::Duration::hours(1);
        let mut entry = WeakWordEntry::first_miss(item(), Modality::Meaning, fixed_now());
        entry.record_miss(Modality::Spelling, later);
        assert!(entry.is_weak_in(Modality::Meaning));
        assert!(entry.is_weak_in(Modality::Spelling));
        assert_eq!(entry.last_missed(), later);
    }

    #[test]
    fn clearing_last_modality_empties_entry() {
        let mut entry = WeakWordEntry::first_miss(item(), Modality::Meaning, fixed_now());
        entry.record_miss(Modality::Spelling, fixed_now());

        let Cleared::Remaining(entry) = entry.clear(Modality::Meaning) else {
            panic!("spelling should remain");
        };
        assert!(!entry.is_weak_in(Modality::Meaning));
        assert_eq!(entry.clear(Modality::Spelling), Cleared::Empty);
    }

    #[test]
    fn clearing_absent_modality_keeps_entry() {
        let entry = WeakWordEntry::first_miss(item(), Modality::Spelling, fixed_now());
        assert!(matches!(entry.clear(Modality::Meaning), Cleared::Remaining(_)));
    }

    #[test]
    fn weak_types_reject_empty_set() {
        assert!(WeakTypes::from_set(BTreeSet::new()).is_none());
        assert!(WeakTypes::try_from(BTreeSet::new()).is_err());
    }
}
