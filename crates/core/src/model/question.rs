use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::model::{QuizMode, VocabId, VocabularyItem};

/// Number of answer choices on every question.
pub const CHOICE_COUNT: usize = 4;

//
// ─── CHOICE ────────────────────────────────────────────────────────────────────
//

/// One multiple-choice option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// A real meaning from the corpus.
    Meaning(String),
    /// Filler used when the pool cannot supply enough distinct distractors.
    /// Never equal to any meaning and never correct.
    Placeholder,
}

impl Choice {
    /// Text to render for this choice.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Choice::Meaning(text) => text,
            Choice::Placeholder => "-",
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Choice::Placeholder)
    }
}

/// A submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Index into the current question's choices.
    Choice(usize),
    /// Free text, as typed.
    Text(String),
}

impl Answer {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A vocabulary item with its four shuffled answer choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    item: VocabularyItem,
    choices: [Choice; CHOICE_COUNT],
}

impl Question {
    /// Build a question for `item`, drawing three distractors from `pool`.
    ///
    /// Pool entries with the same id as `item`, or whose meaning repeats the
    /// correct meaning or an earlier distractor, are skipped. Missing slots are
    /// padded with `Choice::Placeholder`.
    pub fn generate<R: Rng + ?Sized>(
        item: VocabularyItem,
        pool: &[VocabularyItem],
        rng: &mut R,
    ) -> Self {
        let id = item.id();
        let correct = item.meaning().to_owned();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(correct.as_str());

        let mut candidates: Vec<&VocabularyItem> =
            pool.iter().filter(|other| other.id() != id).collect();
        candidates.shuffle(rng);

        let mut distractors = candidates
            .into_iter()
            .filter(|other| seen.insert(other.meaning()))
            .take(CHOICE_COUNT - 1)
            .map(|other| Choice::Meaning(other.meaning().to_owned()));

        let mut choices: [Choice; CHOICE_COUNT] = std::array::from_fn(|slot| {
            if slot == 0 {
                Choice::Meaning(correct.clone())
            } else {
                distractors.next().unwrap_or(Choice::Placeholder)
            }
        });
        choices.shuffle(rng);

        Self { item, choices }
    }

    /// Reorder the choices in place.
    pub fn shuffle_choices<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.choices.shuffle(rng);
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
    pub fn choices(&self) -> &[Choice; CHOICE_COUNT] {
        &self.choices
    }

    /// Index of the correct meaning among the choices.
    #[must_use]
    pub fn correct_index(&self) -> Option<usize> {
        self.choices
            .iter()
            .position(|c| matches!(c, Choice::Meaning(m) if m == self.item.meaning()))
    }

    /// The text that counts as correct in the given mode.
    #[must_use]
    pub fn expected(&self, mode: QuizMode) -> &str {
        match mode {
            QuizMode::Choice => self.item.meaning(),
            QuizMode::Spelling | QuizMode::SpellingEasy => self.item.word(),
        }
    }

    /// Evaluate an answer.
    ///
    /// Choice mode requires an exact match with the meaning; spelling modes compare
    /// the trimmed input against the word, ignoring case.
    #[must_use]
    pub fn is_correct(&self, mode: QuizMode, answer: &Answer) -> bool {
        match (mode, answer) {
            (QuizMode::Choice, Answer::Choice(index)) => matches!(
                self.choices.get(*index),
                Some(Choice::Meaning(m)) if m == self.item.meaning()
            ),
            (QuizMode::Choice, Answer::Text(text)) => text == self.item.meaning(),
            (QuizMode::Spelling | QuizMode::SpellingEasy, Answer::Text(text)) => {
                text.trim().to_lowercase() == self.item.word().to_lowercase()
            }
            (QuizMode::Spelling | QuizMode::SpellingEasy, Answer::Choice(_)) => false,
        }
    }
}

/// Turn selected items into questions, dropping duplicate ids.
pub fn build_questions<R: Rng + ?Sized>(
    selected: Vec<VocabularyItem>,
    pool: &[VocabularyItem],
    rng: &mut R,
) -> Vec<Question> {
    let mut ids = HashSet::new();
    selected
        .into_iter()
        .filter(|item| ids.insert(item.id()))
        .map(|item| Question::generate(item, pool, rng))
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tier, VocabularyDraft};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn item(id: u64, word: &str, meaning: &str) -> VocabularyItem {
        VocabularyDraft::new(word, meaning)
            .with_tier(Tier::new(1))
            .validate(VocabId::new(id))
            .unwrap()
    }

    fn corpus(n: u64) -> Vec<VocabularyItem> {
        (1..=n)
            .map(|i| item(i, &format!("word{i}"), &format!("meaning{i}")))
            .collect()
    }

    #[test]
    fn choices_hold_exactly_one_correct_meaning() {
        let pool = corpus(20);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let q = Question::generate(pool[3].clone(), &pool, &mut rng);
            let correct = q
                .choices()
                .iter()
                .filter(|c| c.label() == "meaning4")
                .count();
            assert_eq!(correct, 1);

            let distinct: HashSet<&str> = q.choices().iter().map(Choice::label).collect();
            assert_eq!(distinct.len(), CHOICE_COUNT);
            assert!(q.choices().iter().all(|c| !c.is_placeholder()));
        }
    }

    #[test]
    fn small_pool_pads_with_placeholders() {
        let pool = corpus(2);
        let mut rng = StdRng::seed_from_u64(7);
        let q = Question::generate(pool[0].clone(), &pool, &mut rng);

        assert_eq!(q.choices().len(), CHOICE_COUNT);
        let placeholders = q.choices().iter().filter(|c| c.is_placeholder()).count();
        assert_eq!(placeholders, 2);
        assert!(q.correct_index().is_some());
    }

    #[test]
    fn duplicate_meanings_are_not_used_as_distractors() {
        let pool = vec![
            item(1, "big", "large"),
            item(2, "huge", "large"),
            item(3, "small", "little"),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let q = Question::generate(pool[0].clone(), &pool, &mut rng);
        let large = q.choices().iter().filter(|c| c.label() == "large").count();
        assert_eq!(large, 1);
    }

    #[test]
    fn choice_mode_requires_exact_meaning() {
        let pool = corpus(5);
        let mut rng = StdRng::seed_from_u64(1);
        let q = Question::generate(pool[0].clone(), &pool, &mut rng);
        let correct = q.correct_index().unwrap();

        assert!(q.is_correct(QuizMode::Choice, &Answer::Choice(correct)));
        assert!(!q.is_correct(QuizMode::Choice, &Answer::Choice((correct + 1) % 4)));
        assert!(q.is_correct(QuizMode::Choice, &Answer::text("meaning1")));
        assert!(!q.is_correct(QuizMode::Choice, &Answer::text("Meaning1")));
        assert!(!q.is_correct(QuizMode::Choice, &Answer::Choice(9)));
    }

    #[test]
    fn spelling_mode_trims_and_ignores_case() {
        let pool = corpus(5);
        let mut rng = StdRng::seed_from_u64(1);
        let q = Question::generate(pool[0].clone(), &pool, &mut rng);

        assert!(q.is_correct(QuizMode::Spelling, &Answer::text("  WORD1 ")));
        assert!(q.is_correct(QuizMode::SpellingEasy, &Answer::text("Word1")));
        assert!(!q.is_correct(QuizMode::Spelling, &Answer::text("word")));
        assert!(!q.is_correct(QuizMode::Spelling, &Answer::Choice(0)));
    }

    #[test]
    fn build_questions_drops_duplicate_ids() {
        let pool = corpus(6);
        let mut rng = StdRng::seed_from_u64(11);
        let selected = vec![pool[0].clone(), pool[1].clone(), pool[0].clone()];
        let questions = build_questions(selected, &pool, &mut rng);
        assert_eq!(questions.len(), 2);
    }
}
