use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use vocab_core::model::{Question, QuizMode, Selection, UserId};
use vocab_core::quiz::{Effect, Event, Phase, QuizSession};

use super::workflow::SessionCompletion;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub phase: Phase,
    /// Zero-based index within the current phase, and that phase's length.
    pub position: Option<(usize, usize)>,
    pub total_questions: usize,
    pub score: u32,
    pub is_complete: bool,
}

/// One user's in-flight session.
///
/// Owned by the caller and never shared; dropping it abandons the session with
/// nothing persisted.
pub struct ActiveSession {
    user: UserId,
    selection: Selection,
    quiz: QuizSession,
    rng: StdRng,
    started_at: DateTime<Utc>,
    study_day: NaiveDate,
    pending_delay: Option<Duration>,
    completion: Option<SessionCompletion>,
}

impl ActiveSession {
    pub(crate) fn new(
        user: UserId,
        selection: Selection,
        quiz: QuizSession,
        rng: StdRng,
        started_at: DateTime<Utc>,
        study_day: NaiveDate,
    ) -> Self {
        Self {
            user,
            selection,
            quiz,
            rng,
            started_at,
            study_day,
            pending_delay: None,
            completion: None,
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.quiz.mode()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.quiz.phase()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Study day captured at start; missions and streaks are credited to it.
    #[must_use]
    pub fn study_day(&self) -> NaiveDate {
        self.study_day
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.current_question()
    }

    #[must_use]
    pub fn current_hint(&self) -> Option<String> {
        self.quiz.current_hint()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.quiz.score()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.quiz.is_finished()
    }

    /// Delay the driver should wait before advancing, if an answer is pending.
    #[must_use]
    pub fn pending_delay(&self) -> Option<Duration> {
        self.pending_delay
    }

    #[must_use]
    pub fn completion(&self) -> Option<&SessionCompletion> {
        self.completion.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            phase: self.quiz.phase(),
            position: self.quiz.position(),
            total_questions: self.quiz.total_questions(),
            score: self.quiz.score(),
            is_complete: self.quiz.is_finished(),
        }
    }

    pub(crate) fn handle(&mut self, event: Event) -> Vec<Effect> {
        let advancing = matches!(event, Event::DelayElapsed) && self.quiz.is_awaiting_advance();
        let effects = self.quiz.handle(event, &mut self.rng);
        if advancing {
            self.pending_delay = None;
        }
        for effect in &effects {
            if let Effect::ScheduleAdvance(delay) = effect {
                self.pending_delay = Some(*delay);
            }
        }
        effects
    }

    pub(crate) fn set_completion(&mut self, completion: SessionCompletion) {
        self.completion = Some(completion);
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("user", &self.user)
            .field("selection", &self.selection)
            .field("mode", &self.quiz.mode())
            .field("phase", &self.quiz.phase())
            .field("position", &self.quiz.position())
            .field("score", &self.quiz.score())
            .field("started_at", &self.started_at)
            .field("study_day", &self.study_day)
            .field("completed", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}
