//! Phase state machine for one drill session.
//!
//! A session runs `Practice → Test → Review? → Result`. The machine is pure:
//! callers feed it [`Event`]s and act on the returned [`Effect`]s (start a timer,
//! show feedback, persist the outcome). Nothing here touches storage or clocks.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::model::{
    Answer, Modality, QuizMode, Question, VocabId, VocabularyItem, masked_spelling,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("a session needs at least one question")]
    EmptyQuestionSet,
}

//
// ─── PHASES, EVENTS, EFFECTS ───────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Practice,
    Test,
    Review,
    Result,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Practice => "practice",
            Phase::Test => "test",
            Phase::Review => "review",
            Phase::Result => "result",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The learner answered the current question.
    Submit(Answer),
    /// The feedback delay scheduled by the last accepted answer has passed.
    DelayElapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Feedback(Feedback),
    /// Fire `Event::DelayElapsed` after this long.
    ScheduleAdvance(Duration),
    PhaseChanged(Phase),
    /// Emitted once, on entering `Phase::Result`.
    Completed(SessionOutcome),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// An answer for this question was already accepted.
    AdvancePending,
    /// No answer is waiting to be advanced past.
    NothingPending,
    /// The session already reached its result.
    Finished,
    /// A spelling answer with nothing but whitespace.
    BlankAnswer,
}

/// Outcome of one accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub phase: Phase,
    pub question_id: VocabId,
    pub correct: bool,
    /// The value that would have been correct, for display on a miss.
    pub expected: String,
}

/// Final tallies handed to the weak-word tracker and progression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub mode: QuizMode,
    /// Correct answers in the test phase only.
    pub score: u32,
    pub total_questions: u32,
    /// Items missed in the test phase, in the order they were missed.
    pub missed: Vec<VocabularyItem>,
    /// Every item in the session.
    pub attempted: Vec<VocabularyItem>,
}

impl SessionOutcome {
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.score == self.total_questions
    }
}

/// Hint shown in `SpellingEasy` mode.
#[must_use]
pub fn spelling_hint(word: &str, phase: Phase) -> String {
    match phase {
        Phase::Practice => word.to_owned(),
        Phase::Test | Phase::Review | Phase::Result => masked_spelling(word),
    }
}

//
// ─── DELAYS ────────────────────────────────────────────────────────────────────
//

/// How long feedback stays on screen before the next question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackDelays {
    pub practice_correct: Duration,
    pub practice_incorrect: Duration,
    pub test_correct: Duration,
    pub test_incorrect: Duration,
    pub review_correct: Duration,
    pub review_incorrect: Duration,
}

impl Default for FeedbackDelays {
    fn default() -> Self {
        Self {
            practice_correct: Duration::from_millis(1000),
            practice_incorrect: Duration::from_millis(1500),
            test_correct: Duration::from_millis(1000),
            test_incorrect: Duration::from_millis(1000),
            review_correct: Duration::from_millis(1000),
            review_incorrect: Duration::from_millis(1500),
        }
    }
}

impl FeedbackDelays {
    /// No waiting at all; for tests and non-interactive drivers.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            practice_correct: Duration::ZERO,
            practice_incorrect: Duration::ZERO,
            test_correct: Duration::ZERO,
            test_incorrect: Duration::ZERO,
            review_correct: Duration::ZERO,
            review_incorrect: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn for_answer(&self, phase: Phase, correct: bool) -> Duration {
        match (phase, correct) {
            (Phase::Practice, true) => self.practice_correct,
            (Phase::Practice, false) => self.practice_incorrect,
            (Phase::Test, true) => self.test_correct,
            (Phase::Test, false) => self.test_incorrect,
            (Phase::Review, true) => self.review_correct,
            (Phase::Review, false) => self.review_incorrect,
            (Phase::Result, _) => Duration::ZERO,
        }
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Practice { index: usize, pending: bool },
    Test { index: usize, pending: bool },
    Review { index: usize, pending: bool },
    Result,
}

/// In-memory state of one session. Owned by a single caller and dropped on
/// abandonment; nothing is persisted until `Effect::Completed`.
#[derive(Debug, Clone)]
pub struct QuizSession {
    mode: QuizMode,
    delays: FeedbackDelays,
    state: State,
    questions: Vec<Question>,
    review_queue: Vec<Question>,
    practice_misses: HashSet<VocabId>,
    score: u32,
}

impl QuizSession {
    /// # Errors
    ///
    /// Returns `QuizError::EmptyQuestionSet` when `questions` is empty.
    pub fn new(
        questions: Vec<Question>,
        mode: QuizMode,
        delays: FeedbackDelays,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::EmptyQuestionSet);
        }
        Ok(Self {
            mode,
            delays,
            state: State::Practice {
                index: 0,
                pending: false,
            },
            questions,
            review_queue: Vec::new(),
            practice_misses: HashSet::new(),
            score: 0,
        })
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Practice { .. } => Phase::Practice,
            State::Test { .. } => Phase::Test,
            State::Review { .. } => Phase::Review,
            State::Result => Phase::Result,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Result)
    }

    /// True while an accepted answer waits for its feedback delay.
    #[must_use]
    pub fn is_awaiting_advance(&self) -> bool {
        matches!(
            self.state,
            State::Practice { pending: true, .. }
                | State::Test { pending: true, .. }
                | State::Review { pending: true, .. }
        )
    }

    /// Running test score. Practice and review never change it.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn practice_misses(&self) -> usize {
        self.practice_misses.len()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Zero-based position and length of the list the current phase walks.
    #[must_use]
    pub fn position(&self) -> Option<(usize, usize)> {
        match self.state {
            State::Practice { index, .. } | State::Test { index, .. } => {
                Some((index, self.questions.len()))
            }
            State::Review { index, .. } => Some((index, self.review_queue.len())),
            State::Result => None,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            State::Practice { index, .. } | State::Test { index, .. } => self.questions.get(index),
            State::Review { index, .. } => self.review_queue.get(index),
            State::Result => None,
        }
    }

    /// Spelling hint for `SpellingEasy`: the whole word while practising, a
    /// masked word afterwards.
    #[must_use]
    pub fn current_hint(&self) -> Option<String> {
        if self.mode != QuizMode::SpellingEasy {
            return None;
        }
        let word = self.current_question()?.item().word();
        Some(spelling_hint(word, self.phase()))
    }

    /// Apply one event and report what the caller should do.
    pub fn handle<R: Rng + ?Sized>(&mut self, event: Event, rng: &mut R) -> Vec<Effect> {
        match event {
            Event::Submit(answer) => self.submit(&answer),
            Event::DelayElapsed => self.advance(rng),
        }
    }

    fn submit(&mut self, answer: &Answer) -> Vec<Effect> {
        let (phase, pending) = match &mut self.state {
            State::Result => return vec![Effect::Ignored(IgnoreReason::Finished)],
            State::Practice { pending, .. } => (Phase::Practice, pending),
            State::Test { pending, .. } => (Phase::Test, pending),
            State::Review { pending, .. } => (Phase::Review, pending),
        };
        if *pending {
            return vec![Effect::Ignored(IgnoreReason::AdvancePending)];
        }
        if self.mode.modality() == Modality::Spelling
            && matches!(answer, Answer::Text(text) if text.trim().is_empty())
        {
            return vec![Effect::Ignored(IgnoreReason::BlankAnswer)];
        }
        *pending = true;

        let Some(question) = self.current_question().cloned() else {
            return vec![Effect::Ignored(IgnoreReason::Finished)];
        };
        let correct = question.is_correct(self.mode, answer);

        match phase {
            Phase::Practice if !correct => {
                self.practice_misses.insert(question.id());
            }
            Phase::Test if correct => self.score += 1,
            Phase::Test => self.review_queue.push(question.clone()),
            _ => {}
        }

        vec![
            Effect::Feedback(Feedback {
                phase,
                question_id: question.id(),
                correct,
                expected: question.expected(self.mode).to_owned(),
            }),
            Effect::ScheduleAdvance(self.delays.for_answer(phase, correct)),
        ]
    }

    fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Effect> {
        let (index, len) = match self.state {
            State::Result => return vec![Effect::Ignored(IgnoreReason::Finished)],
            State::Practice { pending: false, .. }
            | State::Test { pending: false, .. }
            | State::Review { pending: false, .. } => {
                return vec![Effect::Ignored(IgnoreReason::NothingPending)];
            }
            State::Practice { index, .. } | State::Test { index, .. } => {
                (index, self.questions.len())
            }
            State::Review { index, .. } => (index, self.review_queue.len()),
        };

        let next = index + 1;
        if next < len {
            self.state = match self.state {
                State::Practice { .. } => State::Practice {
                    index: next,
                    pending: false,
                },
                State::Test { .. } => State::Test {
                    index: next,
                    pending: false,
                },
                State::Review { .. } | State::Result => State::Review {
                    index: next,
                    pending: false,
                },
            };
            return Vec::new();
        }

        match self.state {
            State::Practice { .. } => {
                self.questions.shuffle(rng);
                for question in &mut self.questions {
                    question.shuffle_choices(rng);
                }
                self.state = State::Test {
                    index: 0,
                    pending: false,
                };
                vec![Effect::PhaseChanged(Phase::Test)]
            }
            State::Test { .. } if !self.review_queue.is_empty() => {
                self.state = State::Review {
                    index: 0,
                    pending: false,
                };
                vec![Effect::PhaseChanged(Phase::Review)]
            }
            _ => self.finish(),
        }
    }

    fn finish(&mut self) -> Vec<Effect> {
        self.state = State::Result;
        let outcome = SessionOutcome {
            mode: self.mode,
            score: self.score,
            total_questions: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            missed: self
                .review_queue
                .iter()
                .map(|q| q.item().clone())
                .collect(),
            attempted: self.questions.iter().map(|q| q.item().clone()).collect(),
        };
        vec![
            Effect::PhaseChanged(Phase::Result),
            Effect::Completed(outcome),
        ]
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
