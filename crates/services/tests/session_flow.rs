use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use services::{
    ActiveSession, AppServices, Clock, ProgressionService, QuestionBank, SessionLoopService,
    SessionStart, WeakWordTracker,
};
use storage::repository::{
    InMemoryRepository, SessionRecordRepository, Storage, StorageError, UserStatsRepository,
    VocabularyRepository,
};
use vocab_core::model::{
    Answer, CHOICE_COUNT, Modality, QuizMode, SessionRecord, Selection, Tier, UserId, UserStats,
    VocabularyDraft,
};
use vocab_core::quiz::{Effect, FeedbackDelays, Phase};
use vocab_core::time::{fixed_now, utc_offset};

async fn corpus(repo: &InMemoryRepository, n: u32) {
    for i in 1..=n {
        repo.insert_vocabulary(
            VocabularyDraft::new(format!("word{i}"), format!("meaning{i}"))
                .with_tier(Tier::new(i % 8 + 1)),
        )
        .await
        .unwrap();
    }
}

fn learner() -> UserId {
    UserId::new("learner-1").unwrap()
}

fn right(session: &ActiveSession) -> Answer {
    let question = session.current_question().unwrap();
    match session.mode() {
        QuizMode::Choice => Answer::Choice(question.correct_index().unwrap()),
        mode => Answer::text(question.expected(mode)),
    }
}

fn wrong(session: &ActiveSession) -> Answer {
    let question = session.current_question().unwrap();
    match session.mode() {
        QuizMode::Choice => {
            let correct = question.correct_index().unwrap();
            Answer::Choice((correct + 1) % CHOICE_COUNT)
        }
        _ => Answer::text("definitely-not-it"),
    }
}

async fn services(repo: &InMemoryRepository) -> AppServices {
    AppServices::from_storage(
        Storage::from_in_memory(repo.clone()),
        Clock::fixed(fixed_now()),
        utc_offset(),
        FeedbackDelays::immediate(),
    )
    .await
    .unwrap()
}

async fn start(loop_svc: &SessionLoopService, selection: Selection, mode: QuizMode) -> ActiveSession {
    match loop_svc
        .start_session(&learner(), selection, mode, 10)
        .await
        .unwrap()
    {
        SessionStart::Ready(session) => session,
        SessionStart::NothingToReview => panic!("expected questions"),
    }
}

#[tokio::test]
async fn tier_session_draws_ten_unique_questions() {
    let repo = InMemoryRepository::new();
    corpus(&repo, 50).await;
    let app = services(&repo).await;
    assert_eq!(app.vocabulary_size(), 50);

    let session = start(
        &app.session_loop(),
        Selection::MaxTier(Tier::new(4)),
        QuizMode::Choice,
    )
    .await;
    let progress = session.progress();
    assert_eq!(progress.phase, Phase::Practice);
    assert_eq!(progress.total_questions, 10);
    assert_eq!(progress.position, Some((0, 10)));

    let question = session.current_question().unwrap();
    assert!(question.item().tier() <= Tier::new(4));
    assert_eq!(question.choices().len(), CHOICE_COUNT);
    let labels: HashSet<_> = question.choices().iter().map(|c| c.label()).collect();
    assert_eq!(labels.len(), CHOICE_COUNT);
}

#[tokio::test]
async fn perfect_session_skips_review_and_levels_up() {
    let repo = InMemoryRepository::new();
    corpus(&repo, 50).await;
    let app = services(&repo).await;
    let loop_svc = app.session_loop();

    let mut session = start(&loop_svc, Selection::MaxTier(Tier::new(4)), QuizMode::Choice).await;
    let mut phases = Vec::new();
    while !session.is_complete() {
        let answer = right(&session);
        let step = loop_svc.answer_current(&mut session, answer).await;
        phases.extend(step.effects.iter().filter_map(|e| match e {
            Effect::PhaseChanged(p) => Some(*p),
            _ => None,
        }));
    }
    assert_eq!(phases, vec![Phase::Test, Phase::Result]);

    let done = loop_svc.completion(&session).unwrap();
    assert_eq!(done.outcome.score, 10);
    assert!(done.outcome.missed.is_empty());
    let progress = done.progression.clone().unwrap();
    // 10 correct plus the perfect bonus crosses the first level boundary.
    assert!(progress.exp_gained >= 120);
    assert!(progress.leveled_up);
    assert_eq!(progress.stats.total_correct, 10);

    let records = loop_svc.recent_sessions(&learner(), 5).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].selection(), &Selection::MaxTier(Tier::new(4)));
}

#[tokio::test]
async fn missed_words_come_back_in_a_weak_word_session() {
    let repo = InMemoryRepository::new();
    corpus(&repo, 50).await;
    let app = services(&repo).await;
    let loop_svc = app.session_loop();

    let mut session = start(&loop_svc, Selection::MaxTier(Tier::new(8)), QuizMode::Spelling).await;
    while session.phase() == Phase::Practice {
        let answer = right(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }
    // Miss the first three test questions.
    for _ in 0..3 {
        let answer = wrong(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }
    while session.phase() == Phase::Test {
        let answer = right(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }
    assert_eq!(session.phase(), Phase::Review);
    assert_eq!(session.progress().position, Some((0, 3)));
    while !session.is_complete() {
        let answer = wrong(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }

    let done = loop_svc.completion(&session).unwrap();
    // Review answers never change the score.
    assert_eq!(done.outcome.score, 7);
    assert_eq!(done.weak_words.added, 3);

    let weak = app.weak_words();
    assert_eq!(weak.list(&learner(), Modality::Spelling).await.unwrap().len(), 3);
    assert!(weak.list(&learner(), Modality::Meaning).await.unwrap().is_empty());

    // Meaning has nothing to review yet.
    let none = loop_svc
        .start_session(&learner(), Selection::WeakWords(learner()), QuizMode::Choice, 10)
        .await
        .unwrap();
    assert!(matches!(none, SessionStart::NothingToReview));

    // Fixing the words in a weak-word spelling session clears them.
    let mut retry = start(&loop_svc, Selection::WeakWords(learner()), QuizMode::SpellingEasy).await;
    assert_eq!(retry.progress().total_questions, 3);
    assert!(retry.current_hint().is_some());
    while !retry.is_complete() {
        let answer = right(&retry);
        loop_svc.answer_current(&mut retry, answer).await;
    }
    let done = loop_svc.completion(&retry).unwrap();
    assert_eq!(done.weak_words.deleted, 3);
    assert_eq!(weak.count(&learner()).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn default_delays_are_waited_out() {
    let repo = InMemoryRepository::new();
    corpus(&repo, 8).await;
    let shared = Arc::new(repo.clone());
    let clock = Clock::fixed(fixed_now());
    let loop_svc = SessionLoopService::new(
        clock,
        QuestionBank::new(shared.clone(), shared.clone()),
        WeakWordTracker::new(clock, shared.clone()),
        ProgressionService::new(clock, utc_offset(), shared.clone()),
        shared,
    );
    let mut session = start(&loop_svc, Selection::MaxTier(Tier::new(8)), QuizMode::Choice).await;

    let answer = wrong(&session);

    let effects = loop_svc.submit(&mut session, answer);
    assert!(effects.contains(&Effect::ScheduleAdvance(Duration::from_millis(1500))));
    assert_eq!(session.pending_delay(), Some(Duration::from_millis(1500)));

    let before = tokio::time::Instant::now();
    loop_svc.advance(&mut session).await;
    assert!(before.elapsed() >= Duration::from_millis(1500));
    assert_eq!(session.pending_delay(), None);
    assert_eq!(session.progress().position, Some((1, 8)));
}

//
// ─── FAILING BACKENDS ──────────────────────────────────────────────────────────
//

struct Unavailable;

#[async_trait]
impl SessionRecordRepository for Unavailable {
    async fn append_record(
        &self,
        _user: &UserId,
        _record: &SessionRecord,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn list_records(
        &self,
        _user: &UserId,
        _limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[async_trait]
impl UserStatsRepository for Unavailable {
    async fn get_stats(&self, _user: &UserId) -> Result<Option<UserStats>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn save_stats(&self, _user: &UserId, _stats: &UserStats) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn storage_failures_at_completion_are_reported_not_fatal() {
    let repo = InMemoryRepository::new();
    corpus(&repo, 8).await;
    let shared = Arc::new(repo.clone());
    let clock = Clock::fixed(fixed_now());
    let loop_svc = SessionLoopService::new(
        clock,
        QuestionBank::new(shared.clone(), shared.clone()),
        WeakWordTracker::new(clock, shared.clone()),
        ProgressionService::new(clock, utc_offset(), Arc::new(Unavailable)),
        Arc::new(Unavailable),
    )
    .with_delays(FeedbackDelays::immediate());

    // Daily resets fail too, and the session still starts.
    let mut session = start(&loop_svc, Selection::MaxTier(Tier::new(8)), QuizMode::Choice).await;
    while session.phase() == Phase::Practice {
        let answer = right(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }
    let answer = wrong(&session);
    loop_svc.answer_current(&mut session, answer).await;
    while !session.is_complete() {
        let answer = right(&session);
        loop_svc.answer_current(&mut session, answer).await;
    }

    let done = loop_svc.completion(&session).unwrap();
    assert!(!done.record_saved);
    assert!(done.progression.is_none());
    // The ledger lives on the healthy backend and was still updated.
    assert_eq!(done.weak_words.added, 1);
    assert!(loop_svc.recent_sessions(&learner(), 5).await.is_err());
}
