use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::SessionRecordRepository;
use tracing::{debug, info, warn};
use vocab_core::model::{Answer, QuizMode, SessionRecord, Selection, UserId};
use vocab_core::progression::ProgressionOutcome;
use vocab_core::quiz::{Effect, Event, Feedback, FeedbackDelays, QuizSession, SessionOutcome};

use super::active::ActiveSession;
use crate::Clock;
use crate::error::SessionError;
use crate::progression::ProgressionService;
use crate::question_bank::QuestionBank;
use crate::weak_words::{WeakWordReport, WeakWordTracker};

/// What `start_session` produced.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum SessionStart {
    Ready(ActiveSession),
    /// A weak-word session was requested but the ledger holds nothing for the mode.
    NothingToReview,
}

/// Side effects applied once a session reaches its result.
///
/// Each step is attempted independently; a failed step is logged and reported
/// here instead of failing the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub outcome: SessionOutcome,
    pub duration_secs: u64,
    pub record_saved: bool,
    pub weak_words: WeakWordReport,
    /// `None` when the stats could not be updated.
    pub progression: Option<ProgressionOutcome>,
}

/// Result of driving a session one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub effects: Vec<Effect>,
    /// Present only on the step that finished the session.
    pub completion: Option<SessionCompletion>,
}

impl StepResult {
    /// Feedback for the answer accepted in this step, if any.
    #[must_use]
    pub fn feedback(&self) -> Option<&Feedback> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Feedback(feedback) => Some(feedback),
            _ => None,
        })
    }
}

/// Orchestrates session start, answering and the completion side effects.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    delays: FeedbackDelays,
    bank: QuestionBank,
    tracker: WeakWordTracker,
    progression: ProgressionService,
    records: Arc<dyn SessionRecordRepository>,
    seed: Option<u64>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: QuestionBank,
        tracker: WeakWordTracker,
        progression: ProgressionService,
        records: Arc<dyn SessionRecordRepository>,
    ) -> Self {
        Self {
            clock,
            delays: FeedbackDelays::default(),
            bank,
            tracker,
            progression,
            records,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_delays(mut self, delays: FeedbackDelays) -> Self {
        self.delays = delays;
        self
    }

    /// Seed every session's shuffles, for reproducible runs.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn delays(&self) -> FeedbackDelays {
        self.delays
    }

    /// Start a session of up to `count` questions.
    ///
    /// Daily resets run first; their failure is logged and does not block the
    /// session. The study day is captured here and credited at completion.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionBank` if the corpus is empty or unreadable.
    pub async fn start_session(
        &self,
        user: &UserId,
        selection: Selection,
        mode: QuizMode,
        count: usize,
    ) -> Result<SessionStart, SessionError> {
        if let Err(e) = self.progression.check_daily_resets(user).await {
            warn!(user = %user, error = %e, "daily resets failed, continuing");
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let questions = self
            .bank
            .select_questions(&selection, mode.modality(), count, &mut rng)
            .await?;
        if questions.is_empty() {
            info!(user = %user, %mode, "no weak words to review");
            return Ok(SessionStart::NothingToReview);
        }

        let total = questions.len();
        let quiz = QuizSession::new(questions, mode, self.delays)?;
        let session = ActiveSession::new(
            user.clone(),
            selection,
            quiz,
            rng,
            self.clock.now(),
            self.progression.today(),
        );
        info!(
            user = %user,
            %mode,
            selection = %session.selection().key(),
            questions = total,
            "session started"
        );
        Ok(SessionStart::Ready(session))
    }

    /// Submit an answer for the current question without advancing.
    ///
    /// The returned effects carry the feedback and the delay to wait before
    /// calling [`SessionLoopService::advance`].
    pub fn submit(&self, session: &mut ActiveSession, answer: Answer) -> Vec<Effect> {
        session.handle(Event::Submit(answer))
    }

    /// Wait out the pending feedback delay, then move to the next question.
    ///
    /// When this step reaches the result, the completion side effects run
    /// before returning.
    pub async fn advance(&self, session: &mut ActiveSession) -> StepResult {
        if let Some(delay) = session.pending_delay().filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }
        let effects = session.handle(Event::DelayElapsed);
        let completion = self.finish_if_completed(session, &effects).await;
        StepResult {
            effects,
            completion,
        }
    }

    /// Submit and, if the answer was accepted, advance after its delay.
    pub async fn answer_current(&self, session: &mut ActiveSession, answer: Answer) -> StepResult {
        let mut effects = self.submit(session, answer);
        let accepted = effects
            .iter()
            .any(|effect| matches!(effect, Effect::ScheduleAdvance(_)));
        if !accepted {
            return StepResult {
                effects,
                completion: None,
            };
        }

        let step = self.advance(session).await;
        effects.extend(step.effects);
        StepResult {
            effects,
            completion: step.completion,
        }
    }

    /// The completion of a finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` before the result phase.
    pub fn completion<'a>(
        &self,
        session: &'a ActiveSession,
    ) -> Result<&'a SessionCompletion, SessionError> {
        session.completion().ok_or(SessionError::NotFinished)
    }

    /// Most recent session records for the user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the records cannot be read.
    pub async fn recent_sessions(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, SessionError> {
        Ok(self.records.list_records(user, limit).await?)
    }

    async fn finish_if_completed(
        &self,
        session: &mut ActiveSession,
        effects: &[Effect],
    ) -> Option<SessionCompletion> {
        let mut outcome = None;
        for effect in effects {
            match effect {
                Effect::PhaseChanged(phase) => {
                    debug!(user = %session.user(), %phase, "phase changed");
                }
                Effect::Completed(done) => outcome = Some(done.clone()),
                _ => {}
            }
        }
        let outcome = outcome?;
        if session.completion().is_some() {
            return None;
        }

        let completion = self.complete(session, outcome).await;
        session.set_completion(completion.clone());
        Some(completion)
    }

    async fn complete(&self, session: &ActiveSession, outcome: SessionOutcome) -> SessionCompletion {
        let user = session.user();
        let now = self.clock.now();
        let duration_secs = u64::try_from((now - session.started_at()).num_seconds()).unwrap_or(0);

        let record_saved = match SessionRecord::new(
            now,
            session.selection().clone(),
            outcome.mode,
            outcome.score,
            outcome.total_questions,
            duration_secs,
        ) {
            Ok(record) => match self.records.append_record(user, &record).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(user = %user, error = %e, "failed to save session record");
                    false
                }
            },
            Err(e) => {
                warn!(user = %user, error = %e, "invalid session record");
                false
            }
        };

        let weak_words = self
            .tracker
            .record_outcome(
                user,
                outcome.mode.modality(),
                &outcome.missed,
                &outcome.attempted,
            )
            .await;

        let progression = match self
            .progression
            .apply_session_result(
                user,
                outcome.score,
                outcome.total_questions,
                duration_secs,
                session.study_day(),
            )
            .await
        {
            Ok(progress) => Some(progress),
            Err(e) => {
                warn!(user = %user, error = %e, "failed to update progression");
                None
            }
        };

        info!(
            user = %user,
            score = outcome.score,
            total = outcome.total_questions,
            missed = outcome.missed.len(),
            duration_secs,
            "session completed"
        );
        SessionCompletion {
            outcome,
            duration_secs,
            record_saved,
            weak_words,
            progression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{
        InMemoryRepository, UserStatsRepository, VocabularyRepository, WeakWordRepository,
    };
    use vocab_core::model::{Modality, Tier, VocabularyDraft};
    use vocab_core::quiz::Phase;
    use vocab_core::time::{fixed_clock, utc_offset};

    async fn seeded(n: u32) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for i in 1..=n {
            repo.insert_vocabulary(
                VocabularyDraft::new(format!("word{i}"), format!("meaning{i}"))
                    .with_tier(Tier::new(1)),
            )
            .await
            .unwrap();
        }
        repo
    }

    fn service(repo: &InMemoryRepository) -> SessionLoopService {
        let clock = fixed_clock();
        let shared = Arc::new(repo.clone());
        SessionLoopService::new(
            clock,
            QuestionBank::new(shared.clone(), shared.clone()),
            WeakWordTracker::new(clock, shared.clone()),
            ProgressionService::new(clock, utc_offset(), shared.clone()),
            shared,
        )
        .with_delays(FeedbackDelays::immediate())
        .with_rng_seed(7)
    }

    fn user() -> UserId {
        UserId::new("learner").unwrap()
    }

    async fn start(svc: &SessionLoopService, mode: QuizMode, count: usize) -> ActiveSession {
        match svc
            .start_session(&user(), Selection::MaxTier(Tier::new(1)), mode, count)
            .await
            .unwrap()
        {
            SessionStart::Ready(session) => session,
            SessionStart::NothingToReview => panic!("expected a session"),
        }
    }

    fn correct(session: &ActiveSession) -> Answer {
        let question = session.current_question().unwrap();
        match session.mode() {
            QuizMode::Choice => Answer::Choice(question.correct_index().unwrap()),
            mode => Answer::text(question.expected(mode)),
        }
    }

    #[tokio::test]
    async fn perfect_run_completes_once_and_persists() {
        let repo = seeded(8).await;
        let svc = service(&repo);
        let mut session = start(&svc, QuizMode::Choice, 4).await;
        assert_eq!(session.phase(), Phase::Practice);

        let mut completions = 0;
        while !session.is_complete() {
            let answer = correct(&session);
            let step = svc.answer_current(&mut session, answer).await;
            assert!(step.feedback().unwrap().correct);
            completions += usize::from(step.completion.is_some());
        }
        assert_eq!(completions, 1);

        let done = svc.completion(&session).unwrap();
        assert_eq!(done.outcome.score, 4);
        assert!(done.record_saved);
        assert_eq!(done.weak_words.added, 0);
        let progress = done.progression.as_ref().unwrap();
        assert_eq!(progress.stats.streak_count, 1);

        let records = svc.recent_sessions(&user(), 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_perfect());
        assert_eq!(repo.get_stats(&user()).await.unwrap().unwrap(), progress.stats);
    }

    #[tokio::test]
    async fn completion_before_result_is_an_error() {
        let repo = seeded(4).await;
        let svc = service(&repo);
        let session = start(&svc, QuizMode::Choice, 2).await;
        assert!(matches!(
            svc.completion(&session),
            Err(SessionError::NotFinished)
        ));
    }

    #[tokio::test]
    async fn double_submit_is_ignored() {
        let repo = seeded(4).await;
        let svc = service(&repo);
        let mut session = start(&svc, QuizMode::Choice, 2).await;

        let answer = correct(&session);

        let first = svc.submit(&mut session, answer);
        assert!(
            first
                .iter()
                .any(|e| matches!(e, Effect::ScheduleAdvance(_)))
        );
        let second = svc.submit(&mut session, Answer::Choice(0));
        assert!(matches!(second.as_slice(), [Effect::Ignored(_)]));

        let step = svc.advance(&mut session).await;
        assert!(step.completion.is_none());
        assert_eq!(session.progress().position, Some((1, 2)));
    }

    #[tokio::test]
    async fn misses_land_in_the_weak_word_ledger() {
        let repo = seeded(6).await;
        let svc = service(&repo);
        let mut session = start(&svc, QuizMode::Spelling, 3).await;

        while session.phase() == Phase::Practice {
            let answer = correct(&session);
            svc.answer_current(&mut session, answer).await;
        }
        // Miss the whole test phase, then fix everything in review.
        while session.phase() == Phase::Test {
            svc.answer_current(&mut session, Answer::text("nope"))
                .await;
        }
        assert_eq!(session.phase(), Phase::Review);
        while !session.is_complete() {
            let answer = correct(&session);
            svc.answer_current(&mut session, answer).await;
        }

        let done = svc.completion(&session).unwrap();
        assert_eq!(done.outcome.score, 0);
        assert_eq!(done.weak_words.added, 3);
        let weak = repo.list_weak_words(&user()).await.unwrap();
        assert_eq!(weak.len(), 3);
        assert!(weak.iter().all(|r| r.weak_types.contains(&Modality::Spelling)));
    }

    #[tokio::test]
    async fn empty_weak_ledger_has_nothing_to_review() {
        let repo = seeded(4).await;
        let svc = service(&repo);
        let start = svc
            .start_session(
                &user(),
                Selection::WeakWords(user()),
                QuizMode::Choice,
                10,
            )
            .await
            .unwrap();
        assert!(matches!(start, SessionStart::NothingToReview));
    }

    #[tokio::test]
    async fn empty_corpus_fails_to_start() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let err = svc
            .start_session(&user(), Selection::MaxTier(Tier::new(4)), QuizMode::Choice, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::QuestionBank(_)));
    }
}
